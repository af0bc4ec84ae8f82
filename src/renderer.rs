// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The worker-side renderer.

The renderer owns the atlas texture and the latest geometry.  Atlas patches are
queued as they arrive and written just before the next geometry is loaded, so a
quad never samples texels that haven't landed yet.  Frames are drawn on the
worker's own display clock, independent of the simulation rate; each frame
computes

```text
t = min((now - interpolation_start) * interpolation_factor, max_extrapolation)
```

and the vertex stage draws every vertex at `position + delta * t`.
*/

mod animation_frame;
pub mod worker;

pub use worker::{Worker, WorkerError, WorkerOptions};

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::mpsc::Sender;

use crate::atlas::AtlasPatch;
use crate::geometry::VERTEX_SIZE;
use crate::imp::{Backend, BackendFactory};
use crate::link::{ClientCommand, GeometryLoad, WorkerCommand};

/// Ceiling on `t` if geometry stops arriving.
pub const DEFAULT_MAX_EXTRAPOLATION: f64 = 5.0;

/// A native window to present into.
///
/// Holds raw platform handles; see [WindowSurface::new] for the contract.
#[derive(Debug)]
pub struct WindowSurface {
    display: RawDisplayHandle,
    window: RawWindowHandle,
    width: u32,
    height: u32,
}

//raw handles are plain identifiers; the constructor's contract covers their use
//from the worker thread
unsafe impl Send for WindowSurface {}

impl WindowSurface {
    /// # Safety
    ///
    /// The window must outlive the renderer, and the platform must allow
    /// presenting to it from the worker thread.
    pub unsafe fn new(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Self {
        WindowSurface {
            display,
            window,
            width,
            height,
        }
    }

    pub fn display_handle(&self) -> RawDisplayHandle {
        self.display
    }

    pub fn window_handle(&self) -> RawWindowHandle {
        self.window
    }
}

/// What the renderer draws into.
#[derive(Debug)]
pub enum RenderSurface {
    /// An offscreen target, for headless rendering and tests.
    Offscreen { width: u32, height: u32 },
    Window(WindowSurface),
}

impl RenderSurface {
    pub fn size(&self) -> (u32, u32) {
        match self {
            RenderSurface::Offscreen { width, height } => (*width, *height),
            RenderSurface::Window(w) => (w.width, w.height),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RendererError {
    #[error("renderer received {command} before initialize")]
    NotInitialized { command: &'static str },
    #[error("renderer already initialized")]
    AlreadyInitialized,
    #[error("tried to load a detached geometry buffer")]
    DetachedBuffer,
    #[error("geometry of {length} bytes ({vertex_count} vertices) doesn't fit a {capacity} byte buffer")]
    MalformedGeometry {
        length: usize,
        vertex_count: u32,
        capacity: usize,
    },
    #[error("image to load is malformed (bytes: {bytes}, width: {width}, height: {height})")]
    MalformedUpload { bytes: usize, width: u32, height: u32 },
    #[error("{width}x{height} patch at ({x}, {y}) is outside the {size}px atlas")]
    UploadOutOfBounds {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        size: u32,
    },
    #[error("atlas magnitude {0} is not supported")]
    BadAtlasMagnitude(u32),
    #[error(transparent)]
    Backend(#[from] crate::imp::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Applies worker commands to a [Backend].
pub struct Renderer {
    factory: Option<BackendFactory>,
    backend: Option<Box<dyn Backend>>,
    pending_uploads: Vec<AtlasPatch>,
    atlas_size: u32,
    draw_length: u32,
    interpolation_start: f64,
    interpolation_factor: f64,
    max_extrapolation: f64,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("initialized", &self.backend.is_some())
            .field("pending_uploads", &self.pending_uploads.len())
            .field("atlas_size", &self.atlas_size)
            .field("draw_length", &self.draw_length)
            .field("interpolation_start", &self.interpolation_start)
            .field("interpolation_factor", &self.interpolation_factor)
            .finish()
    }
}

impl Renderer {
    pub fn new(factory: BackendFactory, max_extrapolation: f64) -> Self {
        Renderer {
            factory: Some(factory),
            backend: None,
            pending_uploads: Vec::new(),
            atlas_size: 0,
            draw_length: 0,
            interpolation_start: 0.0,
            interpolation_factor: 0.0,
            max_extrapolation,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Vertices drawn each frame.
    pub fn draw_length(&self) -> u32 {
        self.draw_length
    }

    pub fn pending_uploads(&self) -> usize {
        self.pending_uploads.len()
    }

    fn backend(&mut self, command: &'static str) -> Result<&mut Box<dyn Backend>, RendererError> {
        self.backend
            .as_mut()
            .ok_or(RendererError::NotInitialized { command })
    }

    /// Applies one command.  Buffers and acknowledgements go out on `reply`.
    pub fn handle(
        &mut self,
        command: WorkerCommand,
        reply: &Sender<ClientCommand>,
    ) -> Result<Control, RendererError> {
        match command {
            WorkerCommand::Initialize {
                surface,
                atlas_size_magnitude,
            } => {
                let factory = self.factory.take().ok_or(RendererError::AlreadyInitialized)?;
                if !(1..=15).contains(&atlas_size_magnitude) {
                    return Err(RendererError::BadAtlasMagnitude(atlas_size_magnitude));
                }
                let atlas_size = 1 << atlas_size_magnitude;
                let (width, height) = surface.size();
                self.backend = Some(factory(surface, atlas_size)?);
                self.atlas_size = atlas_size;
                logwise::info_sync!(
                    "Renderer initialized: {width}x{height} target, {atlas}px atlas",
                    width = width,
                    height = height,
                    atlas = atlas_size
                );
                //main side may have stopped listening; nothing to do about it here
                let _ = reply.send(ClientCommand::Ready);
            }
            WorkerCommand::LoadGeometry(load) => self.load_geometry(load, reply)?,
            WorkerCommand::UploadToAtlas(patch) => self.queue_upload(patch)?,
            WorkerCommand::Resize { width, height } => {
                self.backend("resize")?.resize(width, height)?;
            }
            WorkerCommand::Shutdown => return Ok(Control::Stop),
        }
        Ok(Control::Continue)
    }

    fn queue_upload(&mut self, patch: AtlasPatch) -> Result<(), RendererError> {
        self.backend("uploadToAtlas")?;
        if !patch.is_well_formed() {
            return Err(RendererError::MalformedUpload {
                bytes: patch.pixels.len(),
                width: patch.width,
                height: patch.height,
            });
        }
        let fits = |offset: u32, len: u32| {
            offset
                .checked_add(len)
                .is_some_and(|end| end <= self.atlas_size)
        };
        if !fits(patch.x, patch.width) || !fits(patch.y, patch.height) {
            return Err(RendererError::UploadOutOfBounds {
                width: patch.width,
                height: patch.height,
                x: patch.x,
                y: patch.y,
                size: self.atlas_size,
            });
        }
        self.pending_uploads.push(patch);
        Ok(())
    }

    fn load_geometry(
        &mut self,
        load: GeometryLoad,
        reply: &Sender<ClientCommand>,
    ) -> Result<(), RendererError> {
        self.backend("loadGeometry")?;
        if load.geometry.is_detached() {
            return Err(RendererError::DetachedBuffer);
        }
        if load.geometry_length > load.geometry.capacity()
            || load.geometry_length != load.vertex_count as usize * VERTEX_SIZE
        {
            return Err(RendererError::MalformedGeometry {
                length: load.geometry_length,
                vertex_count: load.vertex_count,
                capacity: load.geometry.capacity(),
            });
        }
        let uploads = std::mem::take(&mut self.pending_uploads);
        let backend = self.backend("loadGeometry")?;
        if !uploads.is_empty() {
            let _perf = logwise::perfwarn_begin!("renderer apply atlas patches");
            for patch in &uploads {
                backend.write_atlas(patch)?;
            }
        }
        backend.load_geometry(
            &load.geometry.as_slice()[..load.geometry_length],
            load.vertex_count,
            load.endian,
        )?;
        self.draw_length = load.vertex_count;
        self.interpolation_start = load.interpolation_start;
        self.interpolation_factor = load.interpolation_factor;
        let _ = reply.send(ClientCommand::ReturnBuffer(load.geometry));
        Ok(())
    }

    /// The scalar the vertex stage multiplies deltas by at `now_ms`.
    pub fn interpolation_at(&self, now_ms: f64) -> f64 {
        ((now_ms - self.interpolation_start) * self.interpolation_factor).min(self.max_extrapolation)
    }

    /// Draws the latest geometry.  Does nothing before initialization.
    pub fn render_frame(&mut self, now_ms: f64) -> Result<(), RendererError> {
        let t = self.interpolation_at(now_ms) as f32;
        if let Some(backend) = self.backend.as_mut() {
            backend.render(t)?;
        }
        Ok(())
    }
}
