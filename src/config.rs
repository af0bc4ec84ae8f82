// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Pipeline tuning.

Defaults match the host engine's native behavior.  [PipelineConfig::from_env]
reads overrides from the environment:

| variable                           | field                  |
|------------------------------------|------------------------|
| `SMOOTH_CANVAS_UPDATES_PER_SECOND` | `updates_per_second`   |
| `SMOOTH_CANVAS_ATLAS_MAGNITUDE`    | `atlas_size_magnitude` |
| `SMOOTH_CANVAS_MAX_QUADS`          | `max_quads`            |
| `SMOOTH_CANVAS_FRAME_INTERVAL_MS`  | `frame_interval`       |
| `SMOOTH_CANVAS_DUMP_ATLAS`         | `dump_atlas`           |
*/

use std::path::PathBuf;

use crate::atlas::DEFAULT_SIZE_MAGNITUDE;
use crate::draw::unsupported::DEFAULT_LOG_BUDGET;
use crate::geometry::DEFAULT_MAX_QUADS;
use crate::interpolation::scheduler::{DEFAULT_RESYNC_THRESHOLD_MS, DEFAULT_UPDATES_PER_SECOND};
use crate::renderer::{DEFAULT_MAX_EXTRAPOLATION, WorkerOptions};
use crate::sys::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{variable}={value:?} is not a valid value")]
    Unparseable { variable: &'static str, value: String },
    #[error("updates_per_second must be in 1..=1000, not {0}")]
    UpdatesPerSecond(u32),
    #[error("atlas_size_magnitude must be in 1..=15, not {0}")]
    AtlasMagnitude(u32),
    #[error("max_quads must be positive")]
    NoQuads,
    #[error("frame_interval must be positive")]
    NoFrameInterval,
    #[error("{field} must be a finite, non-negative number")]
    NotFinite { field: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Simulation ticks per second.
    pub updates_per_second: u32,
    /// How far behind the tick loop may fall before it jumps ahead.
    pub resync_threshold_ms: f64,
    /// Atlas side is `2^atlas_size_magnitude` pixels.
    pub atlas_size_magnitude: u32,
    /// Capacity of each geometry buffer, in quads.
    pub max_quads: usize,
    /// Worker frame pacing.
    pub frame_interval: Duration,
    pub max_extrapolation: f64,
    /// Unsupported drawing calls logged before going quiet.
    pub unsupported_log_budget: u32,
    /// Ticks between sweeps of stale interpolation records.  0 disables sweeping.
    pub prune_interval_ticks: u64,
    /// Write the atlas as PNG here when it changes (software backend).
    pub dump_atlas: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            updates_per_second: DEFAULT_UPDATES_PER_SECOND,
            resync_threshold_ms: DEFAULT_RESYNC_THRESHOLD_MS,
            atlas_size_magnitude: DEFAULT_SIZE_MAGNITUDE,
            max_quads: DEFAULT_MAX_QUADS,
            frame_interval: Duration::from_micros(16_667),
            max_extrapolation: DEFAULT_MAX_EXTRAPOLATION,
            unsupported_log_budget: DEFAULT_LOG_BUDGET,
            prune_interval_ticks: 200,
            dump_atlas: None,
        }
    }
}

fn parse<T: std::str::FromStr>(variable: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Unparseable { variable, value })
}

impl PipelineConfig {
    /// Defaults with overrides from the process environment, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [from_env](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = PipelineConfig::default();
        if let Some(v) = lookup("SMOOTH_CANVAS_UPDATES_PER_SECOND") {
            config.updates_per_second = parse("SMOOTH_CANVAS_UPDATES_PER_SECOND", v)?;
        }
        if let Some(v) = lookup("SMOOTH_CANVAS_ATLAS_MAGNITUDE") {
            config.atlas_size_magnitude = parse("SMOOTH_CANVAS_ATLAS_MAGNITUDE", v)?;
        }
        if let Some(v) = lookup("SMOOTH_CANVAS_MAX_QUADS") {
            config.max_quads = parse("SMOOTH_CANVAS_MAX_QUADS", v)?;
        }
        if let Some(v) = lookup("SMOOTH_CANVAS_FRAME_INTERVAL_MS") {
            let ms: f64 = parse("SMOOTH_CANVAS_FRAME_INTERVAL_MS", v.clone())?;
            if !ms.is_finite() || ms < 0.0 {
                return Err(ConfigError::Unparseable {
                    variable: "SMOOTH_CANVAS_FRAME_INTERVAL_MS",
                    value: v,
                });
            }
            config.frame_interval = Duration::from_micros((ms * 1000.0).round() as u64);
        }
        config.dump_atlas = lookup("SMOOTH_CANVAS_DUMP_ATLAS")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.updates_per_second) {
            return Err(ConfigError::UpdatesPerSecond(self.updates_per_second));
        }
        if !(1..=15).contains(&self.atlas_size_magnitude) {
            return Err(ConfigError::AtlasMagnitude(self.atlas_size_magnitude));
        }
        if self.max_quads == 0 {
            return Err(ConfigError::NoQuads);
        }
        if self.frame_interval.is_zero() {
            return Err(ConfigError::NoFrameInterval);
        }
        if !self.resync_threshold_ms.is_finite() || self.resync_threshold_ms < 0.0 {
            return Err(ConfigError::NotFinite {
                field: "resync_threshold_ms",
            });
        }
        if !self.max_extrapolation.is_finite() || self.max_extrapolation < 0.0 {
            return Err(ConfigError::NotFinite {
                field: "max_extrapolation",
            });
        }
        Ok(())
    }

    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            frame_interval: self.frame_interval,
            max_extrapolation: self.max_extrapolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_engine() {
        let config = PipelineConfig::default();
        assert_eq!(config.updates_per_second, 20);
        assert_eq!(config.atlas_size_magnitude, 11);
        assert_eq!(config.max_quads, 8192);
        assert_eq!(config.max_extrapolation, 5.0);
        assert!(config.validate().is_ok());
        assert_eq!(PipelineConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn overrides_are_applied() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("SMOOTH_CANVAS_UPDATES_PER_SECOND", "60"),
            ("SMOOTH_CANVAS_ATLAS_MAGNITUDE", " 10 "),
            ("SMOOTH_CANVAS_MAX_QUADS", "16"),
            ("SMOOTH_CANVAS_FRAME_INTERVAL_MS", "8.5"),
            ("SMOOTH_CANVAS_DUMP_ATLAS", "/tmp/atlas.png"),
        ]))
        .unwrap();
        assert_eq!(config.updates_per_second, 60);
        assert_eq!(config.atlas_size_magnitude, 10);
        assert_eq!(config.max_quads, 16);
        assert_eq!(config.frame_interval, Duration::from_micros(8_500));
        assert_eq!(config.dump_atlas, Some(PathBuf::from("/tmp/atlas.png")));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            PipelineConfig::from_lookup(lookup(&[("SMOOTH_CANVAS_MAX_QUADS", "lots")])),
            Err(ConfigError::Unparseable {
                variable: "SMOOTH_CANVAS_MAX_QUADS",
                value: "lots".to_string()
            })
        );
        assert_eq!(
            PipelineConfig::from_lookup(lookup(&[("SMOOTH_CANVAS_UPDATES_PER_SECOND", "0")])),
            Err(ConfigError::UpdatesPerSecond(0))
        );
        assert_eq!(
            PipelineConfig::from_lookup(lookup(&[("SMOOTH_CANVAS_ATLAS_MAGNITUDE", "16")])),
            Err(ConfigError::AtlasMagnitude(16))
        );
        assert_eq!(
            PipelineConfig::from_lookup(lookup(&[("SMOOTH_CANVAS_FRAME_INTERVAL_MS", "0")])),
            Err(ConfigError::NoFrameInterval)
        );
    }
}
