// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! System abstractions for cross-platform compatibility.
//!
//! This module provides platform-specific implementations of system functionality
//! that differs between native and WASM targets, plus the millisecond clock the
//! main side and the worker agree on.

use std::sync::atomic::{AtomicU64, Ordering};

pub mod time {
    //! Time abstractions for cross-platform compatibility.
    //!
    //! On native platforms, this re-exports `std::time` types.
    //! On WASM platforms, this re-exports `web_time` types for compatibility.

    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    #[cfg(target_arch = "wasm32")]
    pub use web_time::{Duration, Instant, SystemTime, UNIX_EPOCH};
}

/// A source of wall-clock milliseconds.
///
/// Tick start times are computed as `tick * ms_per_tick` on the main side and compared
/// against `now_ms()` on the worker, so both sides must read the same clock.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since the unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(d) => d.as_secs_f64() * 1000.0,
            //clock before 1970; treat as the epoch
            Err(_) => 0.0,
        }
    }
}

/// A clock that only moves when told to.
///
/// Shareable across threads, so a test can drive the worker's notion of "now".
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        ManualClock {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }
    pub fn set(&self, ms: f64) {
        self.bits.store(ms.to_bits(), Ordering::Release);
    }
    pub fn advance(&self, ms: f64) {
        self.set(self.now_ms() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(1000.0);
        assert_eq!(clock.now_ms(), 1000.0);
        clock.advance(50.0);
        assert_eq!(clock.now_ms(), 1050.0);
        clock.set(3.5);
        assert_eq!(clock.now_ms(), 3.5);
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
    #[test]
    fn system_clock_is_after_2020() {
        //2020-01-01 in epoch ms
        assert!(SystemClock.now_ms() > 1_577_836_800_000.0);
    }
}
