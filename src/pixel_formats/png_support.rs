// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use png::{BitDepth, ColorType};
use std::io::Write;

use crate::pixel_formats::{PixelFormat, RGBA8UNorm};

/// Formats that can be written as PNG.
pub trait PngPixelFormat: PixelFormat {
    fn png_color_type() -> ColorType;
    fn png_bit_depth() -> BitDepth;
}

impl PngPixelFormat for RGBA8UNorm {
    fn png_color_type() -> ColorType {
        ColorType::Rgba
    }

    fn png_bit_depth() -> BitDepth {
        BitDepth::Eight
    }
}

/// Encodes a tightly packed image as PNG.
pub fn write_png<F: PngPixelFormat, W: Write>(
    out: W,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(out, width, height);
    encoder.set_color(F::png_color_type());
    encoder.set_depth(F::png_bit_depth());
    let mut writer = encoder.write_header()?;
    writer.write_image_data(pixels)?;
    writer.finish()
}
