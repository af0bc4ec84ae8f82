// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Frame interpolation.

The simulation runs at a fixed, low tick rate.  To make motion look smooth, every
coordinate a drawable object emits is compared with the coordinate the same
object emitted in the same position of its previous tick's draw.  The difference is
the *delta*; the renderer draws `previous + delta * t`, sliding `t` from 0 toward 1
over the course of the tick.

An object may emit any number of coordinates per draw, so its record holds a
positional history: the n-th coordinate this tick pairs with the n-th coordinate
last tick.  If an object skipped a tick its history is thrown away, since pairing
with a stale value would produce a jump.

Draws made while no object is current (tiles, backgrounds) get the camera scroll
delta instead, so they still move with the view.
*/

pub mod scheduler;
pub mod wrap;

pub use scheduler::{TickOutcome, TickScheduler};
pub use wrap::{DrawFn, DrawTable, interpolated, wrap};

use std::collections::HashMap;

use crate::draw::ScreenTransform;

/// Simulation tick number.
pub type Tick = u64;

/// Identity of a drawable object (or background layer) across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

const INITIAL_HISTORY: usize = 8;

#[derive(Debug, Clone)]
struct Record {
    last_tick: Tick,
    count: usize,
    index: usize,
    list: Vec<f64>,
}

impl Record {
    fn new() -> Self {
        Record {
            last_tick: 0,
            count: 0,
            index: 0,
            list: vec![0.0; INITIAL_HISTORY],
        }
    }

    fn delta(&mut self, value: f64) -> f64 {
        if self.index < self.count {
            let previous = self.list[self.index];
            self.list[self.index] = value;
            self.index += 1;
            value - previous
        } else {
            self.count += 1;
            if self.count > self.list.len() {
                let doubled = self.list.len() * 2;
                self.list.resize(doubled, 0.0);
            }
            self.list[self.index] = value;
            self.index += 1;
            0.0
        }
    }
}

/// Scroll delta saved by [Interpolation::enter_layer].
#[derive(Debug, Clone, Copy, PartialEq)]
#[must_use]
pub struct SavedScroll {
    delta: (f64, f64),
}

#[derive(Debug)]
pub struct Interpolation {
    records: HashMap<ObjectId, Record>,
    current: Option<ObjectId>,
    current_tick: Tick,
    enabled: bool,
    scroll_delta: (f64, f64),
    previous_screen: (f64, f64),
    previous_layer_scroll: HashMap<ObjectId, (f64, f64)>,
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::new()
    }
}

impl Interpolation {
    pub fn new() -> Self {
        Interpolation {
            records: HashMap::new(),
            current: None,
            current_tick: 0,
            enabled: true,
            scroll_delta: (0.0, 0.0),
            previous_screen: (0.0, 0.0),
            previous_layer_scroll: HashMap::new(),
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn set_current_tick(&mut self, tick: Tick) {
        self.current_tick = tick;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// When disabled, wrapped draws pass straight through without tracking and
    /// every delta is zero.  The camera keeps being tracked so that re-enabling
    /// does not produce a jump.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn current(&self) -> Option<ObjectId> {
        self.current
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Makes `object` current, returning whichever object was current before.
    ///
    /// The first entry of a tick rewinds the record's cursor; if the object was not
    /// drawn on the previous tick its history is discarded as well.
    pub fn enter(&mut self, object: ObjectId) -> Option<ObjectId> {
        let tick = self.current_tick;
        let record = self.records.entry(object).or_insert_with(Record::new);
        if record.last_tick < tick {
            record.index = 0;
            if record.last_tick + 1 < tick {
                record.count = 0;
            }
        }
        self.current.replace(object)
    }

    /// Stamps the current object as drawn this tick and restores `prior`.
    pub fn exit(&mut self, prior: Option<ObjectId>) {
        if let Some(current) = self.current
            && let Some(record) = self.records.get_mut(&current)
        {
            record.last_tick = self.current_tick;
        }
        self.current = prior;
    }

    fn delta(&mut self, value: f64, fallback: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        match self.current.and_then(|id| self.records.get_mut(&id)) {
            Some(record) => record.delta(value),
            None => fallback,
        }
    }

    /// Change in x since the matching draw of the previous tick.
    pub fn delta_x(&mut self, value: f64) -> f64 {
        self.delta(value, self.scroll_delta.0)
    }

    pub fn delta_y(&mut self, value: f64) -> f64 {
        self.delta(value, self.scroll_delta.1)
    }

    /// The delta handed to draws made outside any object.
    pub fn scroll_delta(&self) -> (f64, f64) {
        self.scroll_delta
    }

    fn screen_delta(previous: (f64, f64), now: (f64, f64), screen: &ScreenTransform, scale: f64) -> (f64, f64) {
        (
            (previous.0 - now.0) * screen.x_to_screen() * scale,
            (previous.1 - now.1) * screen.y_to_screen() * scale,
        )
    }

    /// Records the camera position for this frame, updating the scroll delta.
    pub fn track_screen(&mut self, origin: (f64, f64), screen: &ScreenTransform, scale: f64) {
        self.scroll_delta = Self::screen_delta(self.previous_screen, origin, screen, scale);
        self.previous_screen = origin;
    }

    /// Switches the scroll delta to that of a layer scrolled to `scroll`.
    ///
    /// Layers that scroll at their own rate (parallax backgrounds) track their
    /// own previous offset.  Pair with [exit_layer](Self::exit_layer).
    pub fn enter_layer(
        &mut self,
        layer: ObjectId,
        scroll: (f64, f64),
        screen: &ScreenTransform,
        scale: f64,
    ) -> SavedScroll {
        let previous = self
            .previous_layer_scroll
            .insert(layer, scroll)
            .unwrap_or(scroll);
        let saved = SavedScroll {
            delta: self.scroll_delta,
        };
        self.scroll_delta = Self::screen_delta(previous, scroll, screen, scale);
        saved
    }

    pub fn exit_layer(&mut self, saved: SavedScroll) {
        self.scroll_delta = saved.delta;
    }

    /// Drops the record of an object that will not draw again.
    pub fn forget(&mut self, object: ObjectId) {
        self.records.remove(&object);
        self.previous_layer_scroll.remove(&object);
        if self.current == Some(object) {
            self.current = None;
        }
    }

    /// Drops records whose history would be discarded on next use anyway.
    ///
    /// Returns the number of records dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.records.len();
        let tick = self.current_tick;
        let current = self.current;
        self.records
            .retain(|id, record| Some(*id) == current || record.last_tick + 1 >= tick);
        before - self.records.len()
    }
}
