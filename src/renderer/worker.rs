// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The render worker thread.

The worker blocks on the command channel until either a command arrives or the
next display frame is due.  Commands are applied in the order they were sent.
Any renderer error is reported back to the main side as a fault and ends the
worker; the main side is expected to tear down and rebuild.
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread::JoinHandle;

use super::animation_frame::AnimationFrames;
use super::{Control, DEFAULT_MAX_EXTRAPOLATION, Renderer, RendererError};
use crate::imp::BackendFactory;
use crate::link::{ClientCommand, WorkerEndpoint};
use crate::sys::Clock;
use crate::sys::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub frame_interval: Duration,
    pub max_extrapolation: f64,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        WorkerOptions {
            frame_interval: Duration::from_micros(16_667),
            max_extrapolation: DEFAULT_MAX_EXTRAPOLATION,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WorkerError {
    #[error("can't spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("render worker panicked")]
    Panicked,
}

/// Handle to a running render worker.
#[derive(Debug)]
pub struct Worker {
    thread: Option<JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl Worker {
    /// Starts the worker.  It renders nothing until an `Initialize` command arrives.
    pub fn spawn(
        endpoint: WorkerEndpoint,
        factory: BackendFactory,
        clock: Arc<dyn Clock>,
        options: WorkerOptions,
    ) -> Result<Worker, WorkerError> {
        let active = Arc::new(AtomicBool::new(true));
        let move_active = active.clone();
        let thread = std::thread::Builder::new()
            .name("smooth_canvas render worker".to_string())
            .spawn(move || run(endpoint, factory, clock, options, move_active))?;
        Ok(Worker {
            thread: Some(thread),
            active,
        })
    }

    /// Pauses or resumes drawing.  Commands are still applied while paused.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Waits for the worker to exit.  Send `Shutdown` (or drop the link) first.
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.active.store(false, Ordering::Release);
        }
    }
}

fn fault(endpoint: &WorkerEndpoint, error: RendererError) {
    logwise::error_sync!(
        "Render worker fault: {error}",
        error = logwise::privacy::LogIt(&error)
    );
    let _ = endpoint.sender.send(ClientCommand::Fault(error.to_string()));
}

fn run(
    endpoint: WorkerEndpoint,
    factory: BackendFactory,
    clock: Arc<dyn Clock>,
    options: WorkerOptions,
    active: Arc<AtomicBool>,
) {
    let mut renderer = Renderer::new(factory, options.max_extrapolation);
    let mut frames = AnimationFrames::new(options.frame_interval);
    logwise::info_sync!("Render worker started");
    loop {
        match endpoint.receiver.recv_timeout(frames.until_next()) {
            Ok(command) => {
                let name = command.name();
                logwise::trace_sync!(
                    "Render worker applying {name}",
                    name = logwise::privacy::LogIt(name)
                );
                match renderer.handle(command, &endpoint.sender) {
                    Ok(Control::Continue) => {}
                    Ok(Control::Stop) => break,
                    Err(e) => {
                        fault(&endpoint, e);
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if frames.is_due() {
            if active.load(Ordering::Acquire)
                && let Err(e) = renderer.render_frame(clock.now_ms())
            {
                fault(&endpoint, e);
                break;
            }
            frames.advance();
        }
    }
    active.store(false, Ordering::Release);
    logwise::info_sync!("Render worker stopped");
}
