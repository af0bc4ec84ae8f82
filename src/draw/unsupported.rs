// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Canvas operations that are accepted and ignored.
//!
//! Paths, strokes, fills, gradients, rotation and clipping draw nothing.  The first
//! few calls are logged so a host relying on them can be spotted.

use super::DrawContext;
use crate::interpolation::Tick;

/// How many unsupported calls are logged before going quiet.
pub const DEFAULT_LOG_BUDGET: u32 = 500;

#[derive(Debug)]
pub struct UnsupportedLog {
    remaining: u32,
    ignored: u64,
}

impl UnsupportedLog {
    pub fn new(budget: u32) -> Self {
        UnsupportedLog {
            remaining: budget,
            ignored: 0,
        }
    }

    /// Total unsupported calls seen, logged or not.
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn note(&mut self, operation: &'static str, args: &[f64], tick: Tick) {
        self.ignored += 1;
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        logwise::warn_sync!(
            "Ignoring unsupported {op} {args} at tick {tick}",
            op = logwise::privacy::LogIt(operation),
            args = logwise::privacy::LogIt(args),
            tick = tick
        );
    }
}

impl Default for UnsupportedLog {
    fn default() -> Self {
        UnsupportedLog::new(DEFAULT_LOG_BUDGET)
    }
}

/// Returned by the gradient constructors.  Color stops go nowhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gradient;

impl Gradient {
    pub fn add_color_stop(&mut self, _offset: f64, _color: &str) {}
}

impl DrawContext {
    fn unsupported(&mut self, operation: &'static str, args: &[f64]) {
        let tick = self.interpolation().current_tick();
        self.unsupported.note(operation, args, tick);
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.unsupported("fillRect", &[x, y, width, height]);
    }

    pub fn stroke_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.unsupported("strokeRect", &[x, y, width, height]);
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.unsupported("rect", &[x, y, width, height]);
    }

    pub fn begin_path(&mut self) {
        self.unsupported("beginPath", &[]);
    }

    pub fn close_path(&mut self) {
        self.unsupported("closePath", &[]);
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.unsupported("moveTo", &[x, y]);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.unsupported("lineTo", &[x, y]);
    }

    pub fn arc(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
        start_radians: f64,
        end_radians: f64,
        counter_clockwise: bool,
    ) {
        let ccw = if counter_clockwise { 1.0 } else { 0.0 };
        self.unsupported("arc", &[x, y, radius, start_radians, end_radians, ccw]);
    }

    pub fn fill(&mut self) {
        self.unsupported("fill", &[]);
    }

    pub fn stroke(&mut self) {
        self.unsupported("stroke", &[]);
    }

    pub fn clip(&mut self) {
        self.unsupported("clip", &[]);
    }

    pub fn rotate(&mut self, radians: f64) {
        self.unsupported("rotate", &[radians]);
    }

    pub fn create_linear_gradient(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> Gradient {
        self.unsupported("createLinearGradient", &[x0, y0, x1, y1]);
        Gradient
    }

    pub fn create_radial_gradient(
        &mut self,
        x0: f64,
        y0: f64,
        r0: f64,
        x1: f64,
        y1: f64,
        r1: f64,
    ) -> Gradient {
        self.unsupported("createRadialGradient", &[x0, y0, r0, x1, y1, r1]);
        Gradient
    }

    /// Unsupported calls seen so far.
    pub fn ignored_calls(&self) -> u64 {
        self.unsupported.ignored()
    }
}
