// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

use super::screen::ScreenTransform;
use super::state::{DrawState, StateStack};
use super::unsupported::UnsupportedLog;
use super::DrawError;
use crate::atlas::{Atlas, SourceRegion};
use crate::config::PipelineConfig;
use crate::geometry::{GeometryWriter, PushOutcome, Quad};
use crate::host::{DrawSource, SourceId};
use crate::interpolation::{Interpolation, Tick};
use crate::link::{GeometryLoad, Link};
use crate::sys::time::Duration;

/// Main-side drawing state for one render target.
///
/// Owns the atlas bookkeeping, the interpolation records, the geometry writer and
/// the main side of the worker link.
#[derive(Debug)]
pub struct DrawContext {
    states: StateStack,
    screen: ScreenTransform,
    atlas: Atlas,
    interpolation: Interpolation,
    geometry: GeometryWriter,
    link: Link,
    pub(super) unsupported: UnsupportedLog,
    reported_drops: u64,
}

impl DrawContext {
    pub fn new(config: &PipelineConfig, link: Link) -> Self {
        DrawContext {
            states: StateStack::default(),
            screen: ScreenTransform::default(),
            atlas: Atlas::new(config.atlas_size_magnitude),
            interpolation: Interpolation::new(),
            geometry: GeometryWriter::new(config.max_quads),
            link,
            unsupported: UnsupportedLog::new(config.unsupported_log_budget),
            reported_drops: 0,
        }
    }

    pub fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    pub fn atlas_mut(&mut self) -> &mut Atlas {
        &mut self.atlas
    }

    pub fn interpolation(&self) -> &Interpolation {
        &self.interpolation
    }

    pub fn interpolation_mut(&mut self) -> &mut Interpolation {
        &mut self.interpolation
    }

    pub fn geometry(&self) -> &GeometryWriter {
        &self.geometry
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn screen(&self) -> &ScreenTransform {
        &self.screen
    }

    pub fn state(&self) -> &DrawState {
        self.states.current()
    }

    /// Sets the tick that reservations and interpolation records are stamped with.
    pub fn set_tick(&mut self, tick: Tick) {
        self.interpolation.set_current_tick(tick);
    }

    /// Recomputes the clip mapping and camera scroll delta for a new frame.
    pub fn begin_frame(&mut self, target: (u32, u32), screen_origin: (f64, f64), scale: f64) {
        self.screen.update(target.0, target.1);
        self.interpolation
            .track_screen(screen_origin, &self.screen, scale);
    }

    pub fn save(&mut self) {
        self.states.save();
    }

    pub fn restore(&mut self) {
        self.states.restore();
    }

    pub fn scale(&mut self, x: f64, y: f64) {
        self.states.scale(x, y);
    }

    pub fn translate(&mut self, x: f64, y: f64) {
        self.states.translate(x, y);
    }

    pub fn global_alpha(&self) -> f64 {
        self.states.current().global_alpha
    }

    pub fn set_global_alpha(&mut self, alpha: f64) {
        self.states.set_global_alpha(alpha);
    }

    /// Draws the `(sx, sy, sw, sh)` region of `image` into `(dx, dy, dw, dh)`.
    ///
    /// Returns whether a quad was emitted.  A quad is skipped when the source region
    /// is empty, when the atlas can't hold it this tick, or while the geometry
    /// buffer is with the worker.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_image(
        &mut self,
        image: &dyn DrawSource,
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        dx: f64,
        dy: f64,
        dw: f64,
        dh: f64,
    ) -> Result<bool, DrawError> {
        if !(sw > 0.0 && sh > 0.0) {
            return Ok(false);
        }
        let Some(region) = SourceRegion::quantize(sx, sy, sw, sh, image.width(), image.height())
        else {
            return Ok(false);
        };
        //trim the destination by whatever of the source lies outside the image
        let (src_x1, src_x2) = (sx.max(0.0), (sx + sw).min(image.width() as f64));
        let (src_y1, src_y2) = (sy.max(0.0), (sy + sh).min(image.height() as f64));
        let (per_texel_x, per_texel_y) = (dw / sw, dh / sh);
        let (dx1, dx2) = (
            dx + (src_x1 - sx) * per_texel_x,
            dx + (src_x2 - sx) * per_texel_x,
        );
        let (dy1, dy2) = (
            dy + (src_y1 - sy) * per_texel_y,
            dy + (src_y2 - sy) * per_texel_y,
        );

        let state = *self.states.current();
        let ((x1, y1), (x2, y2)) = if state.is_identity {
            ((dx1, dy1), (dx2, dy2))
        } else {
            (
                state.transform.apply(dx1, dy1),
                state.transform.apply(dx2, dy2),
            )
        };
        let (x1, y1) = self.screen.to_clip(x1, y1);
        let (x2, y2) = self.screen.to_clip(x2, y2);

        //slot order is part of the record's history
        let delta_x1 = self.interpolation.delta_x(x1);
        let delta_y1 = self.interpolation.delta_y(y1);
        let delta_x2 = self.interpolation.delta_x(x2);
        let delta_y2 = self.interpolation.delta_y(y2);

        let tick = self.interpolation.current_tick();
        let reservation = self.atlas.reservation_for(image.source_id(), region);
        if !self
            .atlas
            .reserve(reservation, image, region, tick, &mut self.link)?
        {
            return Ok(false);
        }
        let Some(placement) = self.atlas.placement(reservation) else {
            return Ok(false);
        };

        let u1 = placement.x as f64 + src_x1 - region.x as f64;
        let v1 = placement.y as f64 + src_y1 - region.y as f64;
        let u2 = placement.x as f64 + src_x2 - region.x as f64;
        let v2 = placement.y as f64 + src_y2 - region.y as f64;
        let quad = Quad {
            x1: (x1 - delta_x1) as f32,
            y1: (y1 - delta_y1) as f32,
            x2: (x2 - delta_x2) as f32,
            y2: (y2 - delta_y2) as f32,
            dx1: delta_x1 as f32,
            dy1: delta_y1 as f32,
            dx2: delta_x2 as f32,
            dy2: delta_y2 as f32,
            u1: u1 as i16,
            v1: v1 as i16,
            u2: u2 as i16,
            v2: v2 as i16,
            color: state.computed_color,
        };
        Ok(self.geometry.push_quad(&quad) == PushOutcome::Written)
    }

    /// Sends this tick's geometry to the worker and starts a new tick's buffer.
    ///
    /// `Ok(false)` if the previous buffer hasn't come back yet; this tick's quads
    /// were never written, and the renderer keeps drawing the last geometry it has.
    pub fn finalize(&mut self, start_ms: f64, factor: f64) -> Result<bool, DrawError> {
        let dropped = self.geometry.dropped_quads();
        if dropped > self.reported_drops {
            logwise::warn_sync!(
                "Geometry buffer full; dropped {count} quads",
                count = dropped - self.reported_drops
            );
            self.reported_drops = dropped;
        }
        let Some(finished) = self.geometry.finish() else {
            return Ok(false);
        };
        self.link.load_geometry(GeometryLoad {
            geometry: finished.buffer,
            geometry_length: finished.length,
            vertex_count: finished.vertex_count,
            endian: finished.endian,
            interpolation_start: start_ms,
            interpolation_factor: factor,
        })?;
        Ok(true)
    }

    /// Takes back any geometry buffer the worker has returned.
    pub fn poll_link(&mut self) -> Result<(), DrawError> {
        while let Some(buffer) = self.link.poll()? {
            self.geometry.reattach(buffer)?;
        }
        Ok(())
    }

    /// Blocks until the worker is ready, taking back any buffers it returns meanwhile.
    pub fn wait_until_ready(&mut self, timeout: Duration) -> Result<bool, DrawError> {
        let (ready, returned) = self.link.wait_until_ready(timeout)?;
        for buffer in returned {
            self.geometry.reattach(buffer)?;
        }
        Ok(ready)
    }

    /// Drops atlas space and cache entries held for `source`.
    pub fn forget_source(&mut self, source: SourceId) -> usize {
        let tick = self.interpolation.current_tick();
        self.atlas.forget_source(source, tick)
    }

    /// Clears the state stack, as when the host's surface is recreated.
    pub fn reset_state(&mut self) {
        self.states.reset();
    }
}
