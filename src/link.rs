// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Main side <-> worker messages.

Everything that crosses the thread boundary moves by value.  Once a geometry
buffer or atlas bitmap is sent, the sender no longer has it; the geometry buffer
comes back in [ClientCommand::ReturnBuffer] after the worker has copied it out.
*/

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::atlas::{AtlasPatch, AtlasSink};
use crate::geometry::{Endian, GeometryBuffer};
use crate::renderer::RenderSurface;
use crate::sys::time::Duration;

/// Geometry for one tick.
#[derive(Debug)]
pub struct GeometryLoad {
    pub geometry: GeometryBuffer,
    /// Bytes of `geometry` in use.
    pub geometry_length: usize,
    pub vertex_count: u32,
    pub endian: Endian,
    /// Wall-clock ms at which the geometry's tick started.
    pub interpolation_start: f64,
    /// Converts ms after `interpolation_start` to tick fractions.
    pub interpolation_factor: f64,
}

/// Messages to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    Initialize {
        surface: RenderSurface,
        atlas_size_magnitude: u32,
    },
    LoadGeometry(GeometryLoad),
    UploadToAtlas(AtlasPatch),
    Resize {
        width: u32,
        height: u32,
    },
    Shutdown,
}

impl WorkerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerCommand::Initialize { .. } => "initialize",
            WorkerCommand::LoadGeometry(_) => "loadGeometry",
            WorkerCommand::UploadToAtlas(_) => "uploadToAtlas",
            WorkerCommand::Resize { .. } => "resize",
            WorkerCommand::Shutdown => "shutdown",
        }
    }
}

/// Messages from the worker.
#[derive(Debug)]
pub enum ClientCommand {
    /// The renderer finished initializing.
    Ready,
    ReturnBuffer(GeometryBuffer),
    /// The renderer stopped on an error.
    Fault(String),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum LinkError {
    #[error("worker not yet initialized (sending {command})")]
    NotInitialized { command: &'static str },
    #[error("worker already initialized")]
    AlreadyInitialized,
    #[error("worker has gone away")]
    Disconnected,
    #[error("worker fault: {0}")]
    WorkerFault(String),
}

/// The worker's ends of the channel.
#[derive(Debug)]
pub struct WorkerEndpoint {
    pub(crate) receiver: Receiver<WorkerCommand>,
    pub(crate) sender: Sender<ClientCommand>,
}

/// The main side's ends of the channel.
#[derive(Debug)]
pub struct Link {
    sender: Sender<WorkerCommand>,
    receiver: Receiver<ClientCommand>,
    initialized: bool,
    ready: bool,
}

pub fn channel() -> (Link, WorkerEndpoint) {
    let (to_worker, from_main) = mpsc::channel();
    let (to_main, from_worker) = mpsc::channel();
    (
        Link {
            sender: to_worker,
            receiver: from_worker,
            initialized: false,
            ready: false,
        },
        WorkerEndpoint {
            receiver: from_main,
            sender: to_main,
        },
    )
}

impl Link {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The worker acknowledged initialization.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn send(&mut self, command: WorkerCommand) -> Result<(), LinkError> {
        if !self.initialized {
            return Err(LinkError::NotInitialized {
                command: command.name(),
            });
        }
        self.sender
            .send(command)
            .map_err(|_| LinkError::Disconnected)
    }

    pub fn initialize(
        &mut self,
        surface: RenderSurface,
        atlas_size_magnitude: u32,
    ) -> Result<(), LinkError> {
        if self.initialized {
            return Err(LinkError::AlreadyInitialized);
        }
        self.initialized = true;
        self.send(WorkerCommand::Initialize {
            surface,
            atlas_size_magnitude,
        })
    }

    pub fn load_geometry(&mut self, load: GeometryLoad) -> Result<(), LinkError> {
        self.send(WorkerCommand::LoadGeometry(load))
    }

    pub fn upload_to_atlas(&mut self, patch: AtlasPatch) -> Result<(), LinkError> {
        self.send(WorkerCommand::UploadToAtlas(patch))
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), LinkError> {
        self.send(WorkerCommand::Resize { width, height })
    }

    /// Asks the worker to stop.  A worker that is already gone is not an error.
    pub fn shutdown(&mut self) {
        if self.initialized {
            let _ = self.sender.send(WorkerCommand::Shutdown);
        }
    }

    fn handle(&mut self, command: ClientCommand) -> Result<Option<GeometryBuffer>, LinkError> {
        match command {
            ClientCommand::Ready => {
                self.ready = true;
                Ok(None)
            }
            ClientCommand::ReturnBuffer(buffer) => Ok(Some(buffer)),
            ClientCommand::Fault(message) => Err(LinkError::WorkerFault(message)),
        }
    }

    /// Handles pending worker messages until one yields a returned buffer.
    ///
    /// `Ok(None)` once nothing is pending.
    pub fn poll(&mut self) -> Result<Option<GeometryBuffer>, LinkError> {
        loop {
            match self.receiver.try_recv() {
                Ok(command) => {
                    if let Some(buffer) = self.handle(command)? {
                        return Ok(Some(buffer));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    return if self.initialized {
                        Err(LinkError::Disconnected)
                    } else {
                        Ok(None)
                    };
                }
            }
        }
    }

    /// Blocks until the worker acknowledges initialization or `timeout` passes.
    ///
    /// Buffers returned in the meantime are handed back.
    pub fn wait_until_ready(
        &mut self,
        timeout: Duration,
    ) -> Result<(bool, Vec<GeometryBuffer>), LinkError> {
        let deadline = crate::sys::time::Instant::now() + timeout;
        let mut returned = Vec::new();
        while !self.ready {
            let left = deadline.saturating_duration_since(crate::sys::time::Instant::now());
            match self.receiver.recv_timeout(left) {
                Ok(command) => returned.extend(self.handle(command)?),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(LinkError::Disconnected),
            }
        }
        Ok((self.ready, returned))
    }
}

impl AtlasSink for Link {
    fn upload_to_atlas(&mut self, patch: AtlasPatch) -> Result<(), LinkError> {
        Link::upload_to_atlas(self, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offscreen() -> RenderSurface {
        RenderSurface::Offscreen {
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn commands_before_initialize_are_rejected() {
        let (mut link, _endpoint) = channel();
        assert_eq!(
            link.resize(1, 1),
            Err(LinkError::NotInitialized { command: "resize" })
        );
        let patch = AtlasPatch {
            pixels: vec![0; 4],
            width: 1,
            height: 1,
            x: 0,
            y: 0,
        };
        assert_eq!(
            link.upload_to_atlas(patch),
            Err(LinkError::NotInitialized {
                command: "uploadToAtlas"
            })
        );
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let (mut link, endpoint) = channel();
        link.initialize(offscreen(), 4).unwrap();
        assert_eq!(
            link.initialize(offscreen(), 4),
            Err(LinkError::AlreadyInitialized)
        );
        assert!(matches!(
            endpoint.receiver.try_recv(),
            Ok(WorkerCommand::Initialize {
                atlas_size_magnitude: 4,
                ..
            })
        ));
    }

    #[test]
    fn poll_surfaces_ready_buffers_and_faults() {
        let (mut link, endpoint) = channel();
        link.initialize(offscreen(), 4).unwrap();
        assert!(matches!(link.poll(), Ok(None)));
        endpoint.sender.send(ClientCommand::Ready).unwrap();
        endpoint
            .sender
            .send(ClientCommand::ReturnBuffer(GeometryBuffer::with_quad_capacity(1)))
            .unwrap();
        let buffer = link.poll().unwrap().unwrap();
        assert!(link.is_ready());
        assert_eq!(buffer.capacity(), 144);
        endpoint
            .sender
            .send(ClientCommand::Fault("lost device".into()))
            .unwrap();
        assert_eq!(
            link.poll().map(|b| b.is_some()),
            Err(LinkError::WorkerFault("lost device".into()))
        );
    }

    #[test]
    fn dropped_worker_is_reported() {
        let (mut link, endpoint) = channel();
        link.initialize(offscreen(), 4).unwrap();
        drop(endpoint);
        assert_eq!(link.resize(2, 2), Err(LinkError::Disconnected));
        assert_eq!(link.poll().map(|b| b.is_some()), Err(LinkError::Disconnected));
    }
}
