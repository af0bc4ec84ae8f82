// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel formats that cross the main/worker boundary.
//!
//! The atlas is a single RGBA texture with 8 bits per channel, and every vertex
//! carries an 8-bit RGBA tint.  Both use [`Unorm4`].
//!
//! ```
//! use smooth_canvas::pixel_formats::{RGBA8UNorm, Unorm4, PixelFormat};
//!
//! let white = Unorm4::WHITE;
//! assert_eq!(white.a, 255);
//! assert_eq!(RGBA8UNorm::BYTES_PER_PIXEL, 4);
//! ```

pub mod png_support;

pub use png_support::write_png;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// A pixel format the atlas understands.
///
/// This trait is sealed and cannot be implemented outside this crate.
pub trait PixelFormat: std::fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    /// Number of bytes per pixel for this format.
    const BYTES_PER_PIXEL: u8;

    /// Byte length of a tightly packed `width` x `height` image.
    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::BYTES_PER_PIXEL as usize
    }
}

/// 8-bit normalized unsigned integer format with RGBA channels.
///
/// This is the atlas format.  Each channel uses 8 bits (0-255 mapped to 0.0-1.0).
#[derive(Debug, Clone)]
pub struct RGBA8UNorm;
impl sealed::Sealed for RGBA8UNorm {}
impl PixelFormat for RGBA8UNorm {
    const BYTES_PER_PIXEL: u8 = 4;
}

/// Four 8-bit normalized channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct Unorm4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Unorm4 {
    pub const WHITE: Unorm4 = Unorm4 {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    /// Applies a global alpha in `0.0..=1.0` to the alpha channel.
    pub fn with_alpha_scaled(self, alpha: f64) -> Unorm4 {
        let a = (self.a as f64 * alpha).round().clamp(0.0, 255.0) as u8;
        Unorm4 { a, ..self }
    }

    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_bytes(bytes: [u8; 4]) -> Unorm4 {
        Unorm4 {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }
}
