// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The 24-byte vertex record.

| offset | type    | field |
|--------|---------|-------|
| 0      | f32     | x     |
| 4      | f32     | y     |
| 8      | f32     | dx    |
| 12     | f32     | dy    |
| 16     | i16     | u     |
| 18     | i16     | v     |
| 20     | u8 x 4  | rgba  |
*/

use super::{Endian, GeometryError};
use crate::pixel_formats::Unorm4;

pub const VERTEX_SIZE: usize = 24;

/// One vertex of a textured quad.
///
/// `x`/`y` are clip-space positions at the *previous* tick; the renderer adds
/// `dx`/`dy` scaled by the interpolation scalar.  `u`/`v` are in atlas texels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub u: i16,
    pub v: i16,
    pub color: Unorm4,
}

impl Vertex {
    /// Writes the vertex into the first [VERTEX_SIZE] bytes of `out`.
    pub fn write(&self, out: &mut [u8], endian: Endian) {
        let out = &mut out[..VERTEX_SIZE];
        out[0..4].copy_from_slice(&endian.f32_bytes(self.x));
        out[4..8].copy_from_slice(&endian.f32_bytes(self.y));
        out[8..12].copy_from_slice(&endian.f32_bytes(self.dx));
        out[12..16].copy_from_slice(&endian.f32_bytes(self.dy));
        out[16..18].copy_from_slice(&endian.i16_bytes(self.u));
        out[18..20].copy_from_slice(&endian.i16_bytes(self.v));
        out[20..24].copy_from_slice(&self.color.to_bytes());
    }

    pub fn position_at(&self, interpolation: f32) -> (f32, f32) {
        (
            self.x + self.dx * interpolation,
            self.y + self.dy * interpolation,
        )
    }
}

/// Cursor over an encoded geometry buffer.
pub struct GeometryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> GeometryReader<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        GeometryReader {
            bytes,
            pos: 0,
            endian,
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], GeometryError> {
        let end = self.pos + N;
        if end > self.bytes.len() {
            return Err(GeometryError::UnexpectedEof { offset: self.pos });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    fn read_f32(&mut self) -> Result<f32, GeometryError> {
        let b = self.read_array::<4>()?;
        Ok(match self.endian {
            Endian::Little => f32::from_le_bytes(b),
            Endian::Big => f32::from_be_bytes(b),
        })
    }

    fn read_i16(&mut self) -> Result<i16, GeometryError> {
        let b = self.read_array::<2>()?;
        Ok(match self.endian {
            Endian::Little => i16::from_le_bytes(b),
            Endian::Big => i16::from_be_bytes(b),
        })
    }

    pub fn read_vertex(&mut self) -> Result<Vertex, GeometryError> {
        Ok(Vertex {
            x: self.read_f32()?,
            y: self.read_f32()?,
            dx: self.read_f32()?,
            dy: self.read_f32()?,
            u: self.read_i16()?,
            v: self.read_i16()?,
            color: Unorm4::from_bytes(self.read_array::<4>()?),
        })
    }
}

/// Decodes exactly `vertex_count` vertices from `bytes`.
pub fn decode_vertices(
    bytes: &[u8],
    vertex_count: u32,
    endian: Endian,
) -> Result<Vec<Vertex>, GeometryError> {
    let expected = vertex_count as usize * VERTEX_SIZE;
    if bytes.len() != expected {
        return Err(GeometryError::LengthMismatch {
            length: bytes.len(),
            vertex_count,
        });
    }
    let mut reader = GeometryReader::new(bytes, endian);
    let mut out = Vec::with_capacity(vertex_count as usize);
    for _ in 0..vertex_count {
        out.push(reader.read_vertex()?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vertex {
        Vertex {
            x: -0.25,
            y: 0.75,
            dx: 0.001,
            dy: -3.5e-5,
            u: 1023,
            v: -2,
            color: Unorm4 {
                r: 1,
                g: 2,
                b: 3,
                a: 200,
            },
        }
    }

    #[test]
    fn field_offsets_follow_the_layout() {
        let mut out = [0u8; VERTEX_SIZE];
        sample().write(&mut out, Endian::Little);
        assert_eq!(&out[0..4], &(-0.25f32).to_le_bytes());
        assert_eq!(&out[8..12], &0.001f32.to_le_bytes());
        assert_eq!(&out[16..18], &1023i16.to_le_bytes());
        assert_eq!(&out[18..20], &(-2i16).to_le_bytes());
        assert_eq!(&out[20..24], &[1, 2, 3, 200]);
    }

    #[test]
    fn big_endian_reverses_multibyte_fields_only() {
        let mut little = [0u8; VERTEX_SIZE];
        let mut big = [0u8; VERTEX_SIZE];
        sample().write(&mut little, Endian::Little);
        sample().write(&mut big, Endian::Big);
        let mut swapped = little[0..4].to_vec();
        swapped.reverse();
        assert_eq!(&big[0..4], swapped.as_slice());
        assert_eq!(&big[20..24], &little[20..24]);
        let decoded = decode_vertices(&big, 1, Endian::Big).unwrap();
        assert_eq!(decoded[0], sample());
    }

    #[test]
    fn short_input_is_rejected() {
        let bytes = [0u8; VERTEX_SIZE + 3];
        assert!(matches!(
            decode_vertices(&bytes, 1, Endian::Little),
            Err(GeometryError::LengthMismatch { .. })
        ));
        let mut reader = GeometryReader::new(&bytes[..10], Endian::Little);
        assert!(matches!(
            reader.read_vertex(),
            Err(GeometryError::UnexpectedEof { offset: 8 })
        ));
    }

    #[test]
    fn position_blends_by_delta() {
        let v = Vertex {
            x: 1.0,
            y: 2.0,
            dx: 0.5,
            dy: -1.0,
            ..sample()
        };
        assert_eq!(v.position_at(0.0), (1.0, 2.0));
        assert_eq!(v.position_at(2.0), (2.0, 0.0));
    }
}
