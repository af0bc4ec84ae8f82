// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel to clip-space mapping, recomputed once per frame.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenTransform {
    x_to_screen: f64,
    y_to_screen: f64,
    x_offset: f64,
    y_offset: f64,
    width: u32,
    height: u32,
}

impl Default for ScreenTransform {
    fn default() -> Self {
        ScreenTransform {
            x_to_screen: 0.0,
            y_to_screen: 0.0,
            x_offset: 0.0,
            y_offset: 0.0,
            width: 0,
            height: 0,
        }
    }
}

impl ScreenTransform {
    /// Clip space spans the target with y pointing up.
    pub fn update(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.x_to_screen = 2.0 / width as f64;
        self.y_to_screen = -2.0 / height as f64;
        self.x_offset = width as f64 * -0.5;
        self.y_offset = height as f64 * -0.5;
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn x_to_screen(&self) -> f64 {
        self.x_to_screen
    }

    pub fn y_to_screen(&self) -> f64 {
        self.y_to_screen
    }

    #[inline]
    pub fn to_clip(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (self.x_offset + x) * self.x_to_screen,
            (self.y_offset + y) * self.y_to_screen,
        )
    }
}
