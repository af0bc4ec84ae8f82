// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reservations: one atlas handle per (source, sub-rectangle).

use std::collections::HashMap;

use super::{Atlas, AtlasError, ReservationId};
use crate::bittricks::pack_region;
use crate::host::{DrawSource, SourceId};
use crate::interpolation::Tick;
use crate::link::LinkError;
use crate::pixel_formats::{PixelFormat, RGBA8UNorm};

/// A whole-texel rectangle within a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRegion {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl SourceRegion {
    /// Snaps a fractional rectangle outward to whole texels and clips it to a
    /// `source_width` x `source_height` image.
    ///
    /// Returns `None` if nothing of the rectangle lies inside the image.
    pub fn quantize(
        sx: f64,
        sy: f64,
        sw: f64,
        sh: f64,
        source_width: u32,
        source_height: u32,
    ) -> Option<SourceRegion> {
        if !(sx.is_finite() && sy.is_finite() && sw.is_finite() && sh.is_finite()) {
            return None;
        }
        let max_w = source_width.min(u16::MAX as u32) as f64;
        let max_h = source_height.min(u16::MAX as u32) as f64;
        let x0 = sx.floor().max(0.0);
        let y0 = sy.floor().max(0.0);
        let x1 = (sx + sw).ceil().min(max_w);
        let y1 = (sy + sh).ceil().min(max_h);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(SourceRegion {
            x: x0 as u16,
            y: y0 as u16,
            width: (x1 - x0) as u16,
            height: (y1 - y0) as u16,
        })
    }

    pub fn key(&self) -> u64 {
        pack_region(self.x, self.y, self.width, self.height)
    }
}

/// Pixels bound for one atlas location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasPatch {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl AtlasPatch {
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == RGBA8UNorm::byte_len(self.width, self.height)
    }
}

/// Where freshly placed reservations send their pixels.
pub trait AtlasSink {
    fn upload_to_atlas(&mut self, patch: AtlasPatch) -> Result<(), LinkError>;
}

impl AtlasSink for Vec<AtlasPatch> {
    fn upload_to_atlas(&mut self, patch: AtlasPatch) -> Result<(), LinkError> {
        self.push(patch);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReserveError {
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    #[error("can't upload atlas patch: {0}")]
    Upload(#[from] LinkError),
    #[error("source returned {actual} bytes for a region needing {expected}")]
    SourceSize { expected: usize, actual: usize },
}

#[derive(Debug, Default)]
pub(super) struct ReservationKeys {
    by_source: HashMap<SourceId, HashMap<u64, ReservationId>>,
}

impl Atlas {
    /// The reservation for `region` of `source`, created on first use.
    pub fn reservation_for(&mut self, source: SourceId, region: SourceRegion) -> ReservationId {
        if let Some(id) = self
            .keys
            .by_source
            .get(&source)
            .and_then(|m| m.get(&region.key()))
        {
            return *id;
        }
        let id = self.create_reservation();
        self.keys
            .by_source
            .entry(source)
            .or_default()
            .insert(region.key(), id);
        id
    }

    /// Number of distinct regions cached for `source`.
    pub fn reservation_count(&self, source: SourceId) -> usize {
        self.keys.by_source.get(&source).map_or(0, |m| m.len())
    }

    /// Makes sure `id` is resident, placing it and uploading its pixels if needed.
    ///
    /// Returns `Ok(false)` if the region can't be drawn this tick.  A failed
    /// placement puts the reservation on cooldown until the next tick.
    pub fn reserve(
        &mut self,
        id: ReservationId,
        source: &dyn DrawSource,
        region: SourceRegion,
        tick: Tick,
        sink: &mut dyn AtlasSink,
    ) -> Result<bool, ReserveError> {
        let reservation = self.reservation_mut(id)?;
        if reservation.placement.is_none() {
            if reservation.last_drawn >= tick {
                //cooling down from a failed placement
                return Ok(false);
            }
            let (width, height) = (region.width as u32, region.height as u32);
            let fits = width <= self.size() && height <= self.size();
            if !fits || !self.allocate(id, width, height, tick)? {
                logwise::warn_sync!(
                    "Unable to allocate {w}x{h} image",
                    w = region.width,
                    h = region.height
                );
                self.reservation_mut(id)?.last_drawn = tick;
                return Ok(false);
            }
            let Some(placement) = self.placement(id) else {
                return Err(AtlasError::UnknownReservation(id).into());
            };
            let pixels = source.read_rgba(region);
            let expected = RGBA8UNorm::byte_len(region.width as u32, region.height as u32);
            if pixels.len() != expected {
                self.release(id, tick)?;
                return Err(ReserveError::SourceSize {
                    expected,
                    actual: pixels.len(),
                });
            }
            logwise::trace_sync!(
                "Loaded a {w}x{h} image at ({x}, {y})",
                w = region.width,
                h = region.height,
                x = placement.x,
                y = placement.y
            );
            let patch = AtlasPatch {
                pixels,
                width: region.width as u32,
                height: region.height as u32,
                x: placement.x,
                y: placement.y,
            };
            if let Err(e) = sink.upload_to_atlas(patch) {
                self.release(id, tick)?;
                return Err(e.into());
            }
        }
        self.reservation_mut(id)?.last_drawn = tick;
        Ok(true)
    }

    /// Drops every reservation of `source`, freeing their space.
    ///
    /// Returns the number of reservations dropped.
    pub fn forget_source(&mut self, source: SourceId, tick: Tick) -> usize {
        let Some(regions) = self.keys.by_source.remove(&source) else {
            return 0;
        };
        let dropped = regions.len();
        for id in regions.into_values() {
            self.destroy_reservation(id, tick);
        }
        dropped
    }
}
