// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Fixed-rate tick scheduling.
//!
//! Tick `n` is due at `n * ms_per_tick` on the shared millisecond clock.  Late wakeups
//! are absorbed by the next wait; if the loop falls too far behind (a suspended
//! thread, a backgrounded tab) the tick counter jumps to the present instead of
//! replaying the backlog.

use super::Tick;
use crate::sys::time::Duration;

/// Default simulation rate.
pub const DEFAULT_UPDATES_PER_SECOND: u32 = 20;
/// How far behind schedule the loop may fall before resynchronizing.
pub const DEFAULT_RESYNC_THRESHOLD_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// How long to sleep before the next tick.
    pub wait: Duration,
    /// The counter jumped to wall-clock time.
    pub resynced: bool,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    updates_per_second: u32,
    ms_per_tick: f64,
    resync_threshold_ms: f64,
    current_tick: Tick,
}

impl TickScheduler {
    pub fn new(updates_per_second: u32, resync_threshold_ms: f64) -> Self {
        assert!(updates_per_second > 0);
        TickScheduler {
            updates_per_second,
            ms_per_tick: 1000.0 / updates_per_second as f64,
            resync_threshold_ms,
            current_tick: 0,
        }
    }

    pub fn updates_per_second(&self) -> u32 {
        self.updates_per_second
    }

    pub fn ms_per_tick(&self) -> f64 {
        self.ms_per_tick
    }

    /// Simulated seconds per tick, handed to the host.
    pub fn tick_length_secs(&self) -> f64 {
        1.0 / self.updates_per_second as f64
    }

    /// Converts milliseconds after a tick's start into tick fractions.
    pub fn interpolation_factor(&self) -> f64 {
        self.updates_per_second as f64 / 1000.0
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Wall-clock time the current tick is nominally due.
    pub fn tick_start_ms(&self) -> f64 {
        self.current_tick as f64 * self.ms_per_tick
    }

    fn tick_at(&self, now_ms: f64) -> Tick {
        (now_ms / self.ms_per_tick).ceil().max(0.0) as Tick
    }

    fn wait_until_current(&self, now_ms: f64) -> f64 {
        self.ms_per_tick * self.current_tick as f64 - now_ms
    }

    fn duration(ms: f64) -> Duration {
        Duration::from_micros((ms.max(0.0) * 1000.0).round() as u64)
    }

    /// Aligns the counter to the first tick at or after `now_ms`.
    pub fn start(&mut self, now_ms: f64) -> Duration {
        self.current_tick = self.tick_at(now_ms);
        Self::duration(self.wait_until_current(now_ms))
    }

    /// Moves to the next tick after one has been run and flushed.
    pub fn advance(&mut self, now_ms: f64) -> TickOutcome {
        self.current_tick += 1;
        let mut wait = self.wait_until_current(now_ms);
        let mut resynced = false;
        if wait < -self.resync_threshold_ms {
            self.current_tick = self.tick_at(now_ms);
            wait = self.wait_until_current(now_ms);
            resynced = true;
            logwise::info_sync!(
                "Tick loop fell behind; resynchronized to tick {tick}",
                tick = self.current_tick
            );
        }
        TickOutcome {
            wait: Self::duration(wait),
            resynced,
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        TickScheduler::new(DEFAULT_UPDATES_PER_SECOND, DEFAULT_RESYNC_THRESHOLD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_aligns_to_next_boundary() {
        let mut s = TickScheduler::default();
        let wait = s.start(1_030.0);
        assert_eq!(s.current_tick(), 21);
        assert_eq!(s.tick_start_ms(), 1_050.0);
        assert_eq!(wait, Duration::from_millis(20));
    }

    #[test]
    fn on_time_ticks_wait_for_the_next_boundary() {
        let mut s = TickScheduler::default();
        s.start(1_000.0);
        let outcome = s.advance(1_010.0);
        assert_eq!(s.current_tick(), 21);
        assert!(!outcome.resynced);
        assert_eq!(outcome.wait, Duration::from_millis(40));
    }

    #[test]
    fn modest_lag_catches_up_without_resync() {
        let mut s = TickScheduler::default();
        s.start(1_000.0);
        //400ms late: tick 21 was due at 1050
        let outcome = s.advance(1_450.0);
        assert_eq!(s.current_tick(), 21);
        assert!(!outcome.resynced);
        assert_eq!(outcome.wait, Duration::ZERO);
    }

    #[test]
    fn large_lag_resynchronizes() {
        let mut s = TickScheduler::default();
        s.start(1_000.0);
        let outcome = s.advance(5_020.0);
        assert!(outcome.resynced);
        assert_eq!(s.current_tick(), 101);
        assert_eq!(outcome.wait, Duration::from_millis(30));
    }

    #[test]
    fn factors() {
        let s = TickScheduler::new(20, 500.0);
        assert_eq!(s.ms_per_tick(), 50.0);
        assert_eq!(s.interpolation_factor(), 0.02);
        assert_eq!(s.tick_length_secs(), 0.05);
    }
}
