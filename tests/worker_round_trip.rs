// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Full main side -> worker round trips on the software backend.
#![cfg(not(target_arch = "wasm32"))]

use smooth_canvas::config::PipelineConfig;
use smooth_canvas::draw::{DrawContext, DrawError};
use smooth_canvas::host::{Host, Interpolated, MemorySource, SourceId};
use smooth_canvas::imp::software::{self, SoftwareFrame, SoftwareProbe};
use smooth_canvas::imp::{self, BackendFactory};
use smooth_canvas::interpolation::{DrawTable, ObjectId};
use smooth_canvas::link::LinkError;
use smooth_canvas::pipeline::{Pipeline, PipelineError};
use smooth_canvas::pixel_formats::Unorm4;
use smooth_canvas::renderer::RenderSurface;
use smooth_canvas::settings::{Graphics, MemoryStore, SettingsManager};
use smooth_canvas::sys::ManualClock;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Sprite {
    id: ObjectId,
    image: MemorySource,
    x: f64,
}

impl Interpolated for Sprite {
    fn interpolation_id(&self) -> ObjectId {
        self.id
    }
}

struct Game {
    sprite: Sprite,
    table: DrawTable<Sprite>,
    size: (u32, u32),
    restored: u32,
}

impl Game {
    fn new() -> Self {
        let mut table = DrawTable::new();
        table.insert(
            "sprite",
            Box::new(|s: &mut Sprite, context: &mut DrawContext| {
                context.draw_image(&s.image, 0.0, 0.0, 4.0, 4.0, s.x, 0.0, 4.0, 4.0)?;
                Ok(())
            }),
        );
        Game {
            sprite: Sprite {
                id: ObjectId(1),
                image: MemorySource::filled(SourceId(1), 4, 4, Unorm4::WHITE),
                x: 0.0,
            },
            table: table.wrap_all(&[]),
            size: (100, 100),
            restored: 0,
        }
    }
}

impl Host for Game {
    fn render_target_size(&self) -> (u32, u32) {
        self.size
    }
    fn screen_origin(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
    fn scale(&self) -> f64 {
        1.0
    }
    fn step(&mut self, context: &mut DrawContext) -> Result<(), DrawError> {
        self.sprite.x += 10.0;
        self.table.draw("sprite", &mut self.sprite, context)?;
        Ok(())
    }
    fn hand_off_timing(&mut self, _tick_length_secs: f64) {}
    fn restore_timing(&mut self) {
        self.restored += 1;
    }
}

fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn pipeline(factory: BackendFactory, clock: Arc<ManualClock>) -> Pipeline {
    let config = PipelineConfig {
        frame_interval: Duration::from_millis(1),
        ..PipelineConfig::default()
    };
    let mut settings = SettingsManager::load(Box::new(MemoryStore::new())).unwrap();
    settings.set_graphics(Graphics::Fast).unwrap();
    Pipeline::new(config, factory, clock, settings).unwrap()
}

fn wait_for_buffer(pipeline: &mut Pipeline) {
    eventually("the geometry buffer to come back", || {
        pipeline.context_mut().poll_link().unwrap();
        pipeline.context().geometry().is_attached()
    });
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

fn first_vertex(frame: &SoftwareFrame) -> Option<(f32, f32)> {
    frame.positions.first().copied()
}

#[test]
fn sprite_slides_between_ticks() {
    let mut game = Game::new();
    let clock = Arc::new(ManualClock::new(1_030.0));
    let probe = SoftwareProbe::default();
    let mut pipeline = pipeline(software::factory(probe.clone(), None), clock.clone());
    pipeline
        .start(&mut game, RenderSurface::Offscreen { width: 100, height: 100 })
        .unwrap();
    assert!(pipeline.wait_until_ready(Duration::from_secs(10)).unwrap());

    //first tick: no history, so no movement
    clock.set(1_050.0);
    pipeline.tick(&mut game).unwrap();
    wait_for_buffer(&mut pipeline);
    assert_eq!(probe.atlas_pixel(0, 0), Some(Unorm4::WHITE));

    //second tick: the sprite moved 10px, 0.2 in clip space
    clock.set(1_100.0);
    pipeline.tick(&mut game).unwrap();
    wait_for_buffer(&mut pipeline);
    let frame = probe.snapshot();
    assert_eq!(frame.geometry_loads, 2);
    assert_eq!(frame.vertices.len(), 6);
    assert!(close(frame.vertices[0].x, -0.8));
    assert!(close(frame.vertices[0].dx, 0.2));
    assert!(close(frame.vertices[0].dy, 0.0));

    //halfway through the tick
    clock.set(1_125.0);
    eventually("a frame halfway between ticks", || {
        let frame = probe.snapshot();
        close(frame.interpolation, 0.5) && first_vertex(&frame).is_some_and(|(x, _)| close(x, -0.7))
    });

    //long stall: extrapolation stops at five ticks
    clock.set(10_000.0);
    eventually("a clamped frame", || {
        let frame = probe.snapshot();
        frame.interpolation == 5.0 && first_vertex(&frame).is_some_and(|(x, _)| close(x, 0.2))
    });

    pipeline.shutdown(&mut game).unwrap();
    assert_eq!(game.restored, 1);
}

#[test]
fn target_size_changes_reach_the_worker() {
    let mut game = Game::new();
    let clock = Arc::new(ManualClock::new(0.0));
    let probe = SoftwareProbe::default();
    let mut pipeline = pipeline(software::factory(probe.clone(), None), clock);
    pipeline
        .start(&mut game, RenderSurface::Offscreen { width: 100, height: 100 })
        .unwrap();
    pipeline.tick(&mut game).unwrap();
    game.size = (200, 100);
    wait_for_buffer(&mut pipeline);
    pipeline.tick(&mut game).unwrap();
    eventually("the resize", || probe.snapshot().target == (200, 100));
    pipeline.shutdown(&mut game).unwrap();
}

#[test]
fn setup_failure_surfaces_as_a_fault() {
    let mut game = Game::new();
    let failing: BackendFactory = Box::new(|_, _| Err(imp::Error::NoSuchAdapter));
    let mut pipeline = pipeline(failing, Arc::new(ManualClock::new(0.0)));
    pipeline
        .start(&mut game, RenderSurface::Offscreen { width: 100, height: 100 })
        .unwrap();
    match pipeline.wait_until_ready(Duration::from_secs(10)) {
        Err(PipelineError::Draw(DrawError::Link(LinkError::WorkerFault(message)))) => {
            assert_eq!(message, "No such adapter");
        }
        other => panic!("expected a worker fault, got {other:?}"),
    }
    pipeline.shutdown(&mut game).unwrap();
}
