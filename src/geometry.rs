// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Binary geometry protocol.

Each tick the main side serializes every drawn quad into a pre-sized
[GeometryBuffer], then hands the whole buffer to the worker.  The worker copies it
to the GPU and sends it back, so at most one buffer is ever in flight and no
allocation happens in steady state.

Multi-byte fields are written in the [Endian] the writer detected when it was
created.  That tag travels with every load so the reader never has to assume
both sides agree on byte order.
*/

pub mod vertex;

pub use vertex::{GeometryReader, VERTEX_SIZE, Vertex, decode_vertices};

use crate::pixel_formats::Unorm4;

pub const VERTICES_PER_QUAD: usize = 6;
pub const QUAD_SIZE: usize = VERTEX_SIZE * VERTICES_PER_QUAD;
/// Default quad capacity of one tick's buffer.
pub const DEFAULT_MAX_QUADS: usize = 2048 * 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeometryError {
    #[error("geometry ended early at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("{length} bytes cannot hold exactly {vertex_count} vertices")]
    LengthMismatch { length: usize, vertex_count: u32 },
    #[error("returned buffer holds {actual} bytes but the writer expects {expected}")]
    CapacityMismatch { expected: usize, actual: usize },
    #[error("writer already holds a buffer")]
    AlreadyAttached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order of the running process.
    pub fn detect() -> Endian {
        if u16::from_ne_bytes([1, 0]) == 1 {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub(crate) fn f32_bytes(self, value: f32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    pub(crate) fn i16_bytes(self, value: i16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

/// A fixed-capacity byte buffer that moves between the main side and the worker.
///
/// A buffer with zero capacity stands for one whose contents were handed away.
#[derive(Debug)]
pub struct GeometryBuffer {
    bytes: Box<[u8]>,
}

impl GeometryBuffer {
    pub fn with_quad_capacity(max_quads: usize) -> Self {
        GeometryBuffer {
            bytes: vec![0u8; max_quads * QUAD_SIZE].into_boxed_slice(),
        }
    }

    pub fn detached() -> Self {
        GeometryBuffer {
            bytes: Box::new([]),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Two corners of an axis-aligned quad, with per-corner deltas and texel coordinates.
///
/// Corner `(x_i, y_j)` gets delta `(dx_i, dy_j)` and texel `(u_i, v_j)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub dx1: f32,
    pub dy1: f32,
    pub dx2: f32,
    pub dy2: f32,
    pub u1: i16,
    pub v1: i16,
    pub u2: i16,
    pub v2: i16,
    pub color: Unorm4,
}

impl Quad {
    fn corner(&self, right: bool, bottom: bool) -> Vertex {
        Vertex {
            x: if right { self.x2 } else { self.x1 },
            y: if bottom { self.y2 } else { self.y1 },
            dx: if right { self.dx2 } else { self.dx1 },
            dy: if bottom { self.dy2 } else { self.dy1 },
            u: if right { self.u2 } else { self.u1 },
            v: if bottom { self.v2 } else { self.v1 },
            color: self.color,
        }
    }

    /// Two triangles sharing the `(x1, y2)`-`(x2, y1)` diagonal.
    pub fn vertices(&self) -> [Vertex; VERTICES_PER_QUAD] {
        [
            self.corner(false, false),
            self.corner(false, true),
            self.corner(true, false),
            self.corner(false, true),
            self.corner(true, true),
            self.corner(true, false),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Written,
    /// The buffer is with the worker; nothing was written.
    Detached,
    /// Capacity reached; the quad was dropped.
    Full,
}

/// A tick's worth of geometry, ready to send.
#[derive(Debug)]
pub struct FinishedGeometry {
    pub buffer: GeometryBuffer,
    pub length: usize,
    pub vertex_count: u32,
    pub endian: Endian,
}

/// Appends quads to the attached buffer.
#[derive(Debug)]
pub struct GeometryWriter {
    buffer: Option<GeometryBuffer>,
    capacity: usize,
    cursor: usize,
    vertex_count: u32,
    endian: Endian,
    dropped: u64,
}

impl GeometryWriter {
    pub fn new(max_quads: usize) -> Self {
        let buffer = GeometryBuffer::with_quad_capacity(max_quads);
        GeometryWriter {
            capacity: buffer.capacity(),
            buffer: Some(buffer),
            cursor: 0,
            vertex_count: 0,
            endian: Endian::detect(),
            dropped: 0,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn is_attached(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn len(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Quads dropped for lack of capacity since the writer was created.
    pub fn dropped_quads(&self) -> u64 {
        self.dropped
    }

    pub fn push_quad(&mut self, quad: &Quad) -> PushOutcome {
        let Some(buffer) = self.buffer.as_mut() else {
            return PushOutcome::Detached;
        };
        if self.cursor + QUAD_SIZE > buffer.bytes.len() {
            self.dropped += 1;
            return PushOutcome::Full;
        }
        for vertex in quad.vertices() {
            vertex.write(&mut buffer.bytes[self.cursor..], self.endian);
            self.cursor += VERTEX_SIZE;
        }
        self.vertex_count += VERTICES_PER_QUAD as u32;
        PushOutcome::Written
    }

    /// Detaches the buffer (if held) and resets the cursor for the next tick.
    pub fn finish(&mut self) -> Option<FinishedGeometry> {
        let length = self.cursor;
        let vertex_count = self.vertex_count;
        self.cursor = 0;
        self.vertex_count = 0;
        self.buffer.take().map(|buffer| FinishedGeometry {
            buffer,
            length,
            vertex_count,
            endian: self.endian,
        })
    }

    /// Takes back a buffer the worker returned.
    pub fn reattach(&mut self, buffer: GeometryBuffer) -> Result<(), GeometryError> {
        if self.buffer.is_some() {
            return Err(GeometryError::AlreadyAttached);
        }
        if buffer.capacity() != self.capacity {
            return Err(GeometryError::CapacityMismatch {
                expected: self.capacity,
                actual: buffer.capacity(),
            });
        }
        self.buffer = Some(buffer);
        Ok(())
    }
}
