// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The capabilities this crate needs from the engine it renders for.

The engine is never inspected; it hands us typed accessors instead.  Images are
[DrawSource]s, drawable objects are [Interpolated], and the engine as a whole is a
[Host] that the [Pipeline](crate::pipeline::Pipeline) drives once per tick.
*/

use crate::atlas::SourceRegion;
use crate::draw::{DrawContext, DrawError};
use crate::interpolation::ObjectId;
use crate::pixel_formats::{PixelFormat, RGBA8UNorm, Unorm4};

/// Identity of an image for atlas caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u64);

/// An image `draw_image` can read from.
pub trait DrawSource {
    fn source_id(&self) -> SourceId;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Tightly packed RGBA8 pixels of `region`, which lies inside the image.
    fn read_rgba(&self, region: SourceRegion) -> Vec<u8>;
}

/// An object whose draws are tracked across ticks.
pub trait Interpolated {
    fn interpolation_id(&self) -> ObjectId;
}

/// The engine being driven.
pub trait Host {
    /// Size in pixels of the surface the engine draws to.
    fn render_target_size(&self) -> (u32, u32);
    /// Camera position in engine units.
    fn screen_origin(&self) -> (f64, f64);
    /// Engine units to pixels.
    fn scale(&self) -> f64;
    /// Runs one simulation step and draws the resulting frame into `context`.
    fn step(&mut self, context: &mut DrawContext) -> Result<(), DrawError>;
    /// Stops the engine's own loop; it now advances `tick_length_secs` per step.
    fn hand_off_timing(&mut self, tick_length_secs: f64);
    /// Gives the engine its own loop and tick length back.
    fn restore_timing(&mut self);
}

/// An RGBA8 image held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    id: SourceId,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl MemorySource {
    /// `None` if `pixels` is not exactly `width * height` RGBA8 texels.
    pub fn new(id: SourceId, width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == RGBA8UNorm::byte_len(width, height)).then_some(MemorySource {
            id,
            width,
            height,
            pixels,
        })
    }

    pub fn filled(id: SourceId, width: u32, height: u32, color: Unorm4) -> Self {
        let pixels = color
            .to_bytes()
            .iter()
            .copied()
            .cycle()
            .take(RGBA8UNorm::byte_len(width, height))
            .collect();
        MemorySource {
            id,
            width,
            height,
            pixels,
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Unorm4) {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&color.to_bytes());
    }
}

impl DrawSource for MemorySource {
    fn source_id(&self) -> SourceId {
        self.id
    }
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn read_rgba(&self, region: SourceRegion) -> Vec<u8> {
        let row_bytes = region.width as usize * 4;
        let mut out = Vec::with_capacity(row_bytes * region.height as usize);
        for row in region.y as usize..region.y as usize + region.height as usize {
            let start = (row * self.width as usize + region.x as usize) * 4;
            out.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        out
    }
}
