// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! smooth_canvas renders a 2D sprite engine at display rate while the engine itself
keeps ticking at a fixed, slow rate.

The engine draws through a [DrawContext](draw::DrawContext) that looks like a
canvas 2D context.  Instead of rasterizing, each `draw_image` becomes a textured
quad: the source pixels are cached in a texture atlas, and the quad carries both
its position at the previous tick and how far it moved since.  A render worker
redraws every quad at display rate, sliding it along that delta according to how
far wall-clock time has progressed into the next tick.

| Side   | Runs                                                 | Owns                                        |
|--------|------------------------------------------------------|---------------------------------------------|
| Main   | host engine, draw context, atlas, interpolation      | atlas quadtree, per-object history, buffers |
| Worker | [renderer::Renderer] on a [imp::Backend]             | atlas texture, latest geometry              |

The two sides share no memory.  They exchange messages from [link], and every
buffer that crosses belongs to exactly one side at a time.

# Ticks and frames

The main side runs on a fixed-timestep loop ([interpolation::TickScheduler],
20 updates per second by default).  Each tick the host steps, draws, and the
resulting geometry is sent with the tick's start time.  The worker computes

```text
t = min((now - tick_start) * updates_per_ms, 5)
```

each frame and draws every vertex at `position + delta * t`.

Interpolation runs only while the persisted graphics setting
([settings::Graphics]) is `fast`.  The default, `original`, leaves the host
drawing on its own timing with every delta zero.

# Backends

[wgpu](https://wgpu.rs) is the default backend (feature `backend_wgpu`), so we
inherit its support for DX12, Vulkan, Metal, WebGPU, WebGL, etc.  A software
backend is always available; it performs the same operations on the CPU and is
what the integration tests observe.

# What is not drawn

Paths, strokes, gradients and clipping are accepted and ignored.  The fast path
is axis-aligned textured quads, which is what the host actually draws.
*/

pub mod atlas;
mod bittricks;
pub mod config;
pub mod draw;
pub mod geometry;
pub mod host;
pub mod imp;
pub mod interpolation;
pub mod link;
pub mod pipeline;
pub mod pixel_formats;
pub mod renderer;
pub mod settings;
pub mod sys;
pub mod transform;

pub use config::PipelineConfig;
pub use draw::DrawContext;
pub use pipeline::{Pipeline, PipelineError};
