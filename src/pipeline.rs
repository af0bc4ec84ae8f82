// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The top-level render pipeline.

A [Pipeline] owns the main side (the [DrawContext], the tick scheduler and the
settings) and the render worker.  The embedder calls [Pipeline::tick] whenever the
previous tick's `wait` has elapsed, or hands control to [Pipeline::run].

```no_run
# use smooth_canvas::host::Host;
# fn demo(host: &mut dyn Host) -> Result<(), smooth_canvas::pipeline::PipelineError> {
use smooth_canvas::config::PipelineConfig;
use smooth_canvas::imp::software::{self, SoftwareProbe};
use smooth_canvas::pipeline::Pipeline;
use smooth_canvas::renderer::RenderSurface;
use smooth_canvas::settings::{MemoryStore, SettingsManager};
use smooth_canvas::sys::SystemClock;
use std::sync::Arc;

let settings = SettingsManager::load(Box::new(MemoryStore::new()))?;
let mut pipeline = Pipeline::new(
    PipelineConfig::from_env()?,
    software::factory(SoftwareProbe::default(), None),
    Arc::new(SystemClock),
    settings,
)?;
pipeline.start(host, RenderSurface::Offscreen { width: 640, height: 480 })?;
for _ in 0..100 {
    let outcome = pipeline.tick(host)?;
    std::thread::sleep(outcome.wait);
}
pipeline.shutdown(host)?;
# Ok(())
# }
```
*/

use std::sync::Arc;

use crate::config::{ConfigError, PipelineConfig};
use crate::draw::{DrawContext, DrawError};
use crate::host::Host;
use crate::imp::BackendFactory;
use crate::interpolation::{TickOutcome, TickScheduler};
use crate::link::{self, LinkError};
use crate::renderer::{RenderSurface, Worker, WorkerError};
use crate::settings::{Graphics, SettingsError, SettingsManager};
use crate::sys::Clock;
use crate::sys::time::Duration;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("Invalid configuration {0}")]
    Config(#[from] ConfigError),
    #[error("Can't draw {0}")]
    Draw(#[from] DrawError),
    #[error("Can't talk to render worker {0}")]
    Link(#[from] LinkError),
    #[error("Render worker error {0}")]
    Worker(#[from] WorkerError),
    #[error("Can't persist settings {0}")]
    Settings(#[from] SettingsError),
    #[error("Pipeline hasn't been started")]
    NotStarted,
}

#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    context: DrawContext,
    scheduler: TickScheduler,
    clock: Arc<dyn Clock>,
    settings: SettingsManager,
    //None once shut down
    worker: Option<Worker>,
    target: Option<(u32, u32)>,
}

impl Pipeline {
    /// Spawns the render worker.  Nothing is drawn until [start](Self::start).
    pub fn new(
        config: PipelineConfig,
        factory: BackendFactory,
        clock: Arc<dyn Clock>,
        settings: SettingsManager,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let (link, endpoint) = link::channel();
        let worker = Worker::spawn(endpoint, factory, clock.clone(), config.worker_options())?;
        let mut context = DrawContext::new(&config, link);
        context
            .interpolation_mut()
            .set_enabled(settings.graphics().interpolates());
        let scheduler = TickScheduler::new(config.updates_per_second, config.resync_threshold_ms);
        Ok(Pipeline {
            config,
            context,
            scheduler,
            clock,
            settings,
            worker: Some(worker),
            target: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn context(&self) -> &DrawContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DrawContext {
        &mut self.context
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.settings
    }

    pub fn is_started(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_interpolating(&self) -> bool {
        self.context.interpolation().is_enabled()
    }

    /// Initializes the worker on `surface` and takes over the host's timing.
    ///
    /// Returns how long to wait before the first tick.
    pub fn start(&mut self, host: &mut dyn Host, surface: RenderSurface) -> Result<Duration, PipelineError> {
        let size = surface.size();
        self.context
            .link_mut()
            .initialize(surface, self.config.atlas_size_magnitude)?;
        self.target = Some(size);
        if self.is_interpolating() {
            host.hand_off_timing(self.scheduler.tick_length_secs());
        }
        let wait = self.scheduler.start(self.clock.now_ms());
        logwise::info_sync!(
            "Pipeline started at tick {tick}, {ups} updates per second",
            tick = self.scheduler.current_tick(),
            ups = self.scheduler.updates_per_second()
        );
        Ok(wait)
    }

    /// Blocks until the worker has set up its backend.
    pub fn wait_until_ready(&mut self, timeout: Duration) -> Result<bool, PipelineError> {
        Ok(self.context.wait_until_ready(timeout)?)
    }

    /// Runs one tick: the host steps and draws, and the geometry goes to the worker.
    pub fn tick(&mut self, host: &mut dyn Host) -> Result<TickOutcome, PipelineError> {
        let Some(target) = self.target else {
            return Err(PipelineError::NotStarted);
        };
        self.context.poll_link()?;
        let size = host.render_target_size();
        if size != target {
            self.context.link_mut().resize(size.0, size.1)?;
            self.target = Some(size);
        }
        let tick = self.scheduler.current_tick();
        self.context.set_tick(tick);
        self.context
            .begin_frame(size, host.screen_origin(), host.scale());
        host.step(&mut self.context)?;
        self.context.finalize(
            self.scheduler.tick_start_ms(),
            self.scheduler.interpolation_factor(),
        )?;
        if self.config.prune_interval_ticks > 0 && tick % self.config.prune_interval_ticks == 0 {
            let pruned = self.context.interpolation_mut().prune();
            if pruned > 0 {
                logwise::trace_sync!("Pruned {pruned} interpolation records", pruned = pruned);
            }
        }
        Ok(self.scheduler.advance(self.clock.now_ms()))
    }

    /// Ticks until `stop` is set, sleeping between ticks.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn run(&mut self, host: &mut dyn Host, stop: &std::sync::atomic::AtomicBool) -> Result<(), PipelineError> {
        while !stop.load(std::sync::atomic::Ordering::Acquire) {
            let outcome = self.tick(host)?;
            std::thread::sleep(outcome.wait);
        }
        Ok(())
    }

    /// Persists `graphics` and switches interpolation to match.
    ///
    /// When this takes over the host's timing on a started pipeline, returns how
    /// long to wait before the next tick; otherwise `None`.
    pub fn set_graphics(
        &mut self,
        host: &mut dyn Host,
        graphics: Graphics,
    ) -> Result<Option<Duration>, PipelineError> {
        if !self.settings.set_graphics(graphics)? {
            return Ok(None);
        }
        let interpolate = graphics.interpolates();
        self.context.interpolation_mut().set_enabled(interpolate);
        let mut wait = None;
        if self.is_started() {
            if interpolate {
                host.hand_off_timing(self.scheduler.tick_length_secs());
                //the gap while disabled would otherwise count as lag
                wait = Some(self.scheduler.start(self.clock.now_ms()));
            } else {
                host.restore_timing();
            }
        }
        logwise::info_sync!(
            "Interpolation {state}",
            state = logwise::privacy::LogIt(&if interpolate { "enabled" } else { "disabled" })
        );
        Ok(wait)
    }

    /// Registers a listener for graphics changes.
    pub fn on_graphics_change(&mut self, listener: impl FnMut(Graphics) + Send + 'static) {
        self.settings.on_graphics_change(listener);
    }

    /// Stops the worker and returns the host its own timing.
    pub fn shutdown(mut self, host: &mut dyn Host) -> Result<(), PipelineError> {
        if self.is_started() && self.is_interpolating() {
            host.restore_timing();
        }
        self.context.link_mut().shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join()?;
        }
        logwise::info_sync!("Pipeline shut down");
        Ok(())
    }
}
