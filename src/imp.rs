// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! GPU backends for the render worker.
//!
//! wgpu is the real backend; the software backend mirrors the same operations on
//! the CPU so the pipeline can be observed in tests and headless tools.

use crate::atlas::AtlasPatch;
use crate::geometry::{Endian, GeometryError};
use crate::renderer::RenderSurface;

pub mod software;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "backend_wgpu")]
    #[error(transparent)]
    CreateSurfaceError(#[from] ::wgpu::CreateSurfaceError),
    #[error("No such adapter")]
    NoSuchAdapter,
    #[cfg(feature = "backend_wgpu")]
    #[error(transparent)]
    RequestDeviceError(#[from] ::wgpu::RequestDeviceError),
    #[cfg(feature = "backend_wgpu")]
    #[error(transparent)]
    SurfaceError(#[from] ::wgpu::SurfaceError),
    #[error("surface has no usable format")]
    UnsupportedSurface,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{size}px atlas exceeds the device limit of {limit}px")]
    AtlasTooLarge { size: u32, limit: u32 },
    #[error("{vertex_count} vertices exceed the vertex buffer ({capacity} vertices)")]
    TooManyVertices { vertex_count: u32, capacity: u32 },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("can't encode atlas image: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Operations the renderer needs from a GPU.
pub trait Backend {
    /// Writes pixels into the atlas texture.
    fn write_atlas(&mut self, patch: &AtlasPatch) -> Result<(), Error>;
    /// Replaces the vertex data drawn each frame.
    fn load_geometry(&mut self, bytes: &[u8], vertex_count: u32, endian: Endian) -> Result<(), Error>;
    /// Draws one frame with every vertex at `position + delta * interpolation`.
    fn render(&mut self, interpolation: f32) -> Result<(), Error>;
    fn resize(&mut self, width: u32, height: u32) -> Result<(), Error>;
}

/// Creates a backend on the worker thread, given the target and the atlas side in pixels.
pub type BackendFactory =
    Box<dyn FnOnce(RenderSurface, u32) -> Result<Box<dyn Backend>, Error> + Send>;
