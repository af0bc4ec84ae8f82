// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The save/restore state stack.

use crate::pixel_formats::Unorm4;
use crate::transform::Matrix;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawState {
    pub color: Unorm4,
    /// `color` with `global_alpha` applied.
    pub computed_color: Unorm4,
    pub global_alpha: f64,
    pub transform: Matrix,
    pub is_identity: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        DrawState {
            color: Unorm4::WHITE,
            computed_color: Unorm4::WHITE,
            global_alpha: 1.0,
            transform: Matrix::IDENTITY,
            is_identity: true,
        }
    }
}

/// Frames are kept after `restore` and overwritten by the next `save`.
#[derive(Debug)]
pub struct StateStack {
    frames: Vec<DrawState>,
    depth: usize,
}

impl Default for StateStack {
    fn default() -> Self {
        StateStack {
            frames: vec![DrawState::default()],
            depth: 0,
        }
    }
}

impl StateStack {
    pub fn current(&self) -> &DrawState {
        &self.frames[self.depth]
    }

    pub fn current_mut(&mut self) -> &mut DrawState {
        &mut self.frames[self.depth]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn save(&mut self) {
        let copy = *self.current();
        self.depth += 1;
        if self.depth == self.frames.len() {
            self.frames.push(copy);
        } else {
            self.frames[self.depth] = copy;
        }
    }

    /// Unbalanced restores leave the base frame in place.
    pub fn restore(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        let state = self.current_mut();
        state.transform = state.transform.scaled(x, y);
        state.is_identity = false;
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        let state = self.current_mut();
        state.transform = state.transform.translated(x, y);
        state.is_identity = false;
    }

    /// Values outside `0.0..=1.0` (and NaN) are ignored.
    pub fn set_global_alpha(&mut self, alpha: f64) {
        if (0.0..=1.0).contains(&alpha) {
            let state = self.current_mut();
            state.global_alpha = alpha;
            state.computed_color = state.color.with_alpha_scaled(alpha);
        }
    }

    /// Back to a single default frame.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.frames[0] = DrawState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_returns_to_saved_state() {
        let mut stack = StateStack::default();
        stack.translate(5.0, 5.0);
        stack.save();
        stack.scale(2.0, 2.0);
        stack.set_global_alpha(0.5);
        assert_eq!(stack.current().computed_color.a, 128);
        stack.restore();
        assert_eq!(stack.current().global_alpha, 1.0);
        assert_eq!(stack.current().transform.apply(0.0, 0.0), (5.0, 5.0));
        assert!(!stack.current().is_identity);
    }

    #[test]
    fn save_reuses_frames_with_fresh_copies() {
        let mut stack = StateStack::default();
        stack.save();
        stack.set_global_alpha(0.25);
        stack.restore();
        stack.save();
        assert_eq!(stack.current().global_alpha, 1.0);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn extra_restores_clamp() {
        let mut stack = StateStack::default();
        stack.restore();
        stack.restore();
        assert_eq!(stack.depth(), 0);
        stack.save();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn out_of_range_alpha_is_ignored() {
        let mut stack = StateStack::default();
        stack.set_global_alpha(0.5);
        stack.set_global_alpha(1.5);
        stack.set_global_alpha(-0.1);
        stack.set_global_alpha(f64::NAN);
        assert_eq!(stack.current().global_alpha, 0.5);
    }
}
