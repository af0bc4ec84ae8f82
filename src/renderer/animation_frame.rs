// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Display-rate frame deadlines for the render worker.

use crate::sys::time::{Duration, Instant};

#[derive(Debug)]
pub(super) struct AnimationFrames {
    interval: Duration,
    next: Instant,
}

impl AnimationFrames {
    pub(super) fn new(interval: Duration) -> Self {
        AnimationFrames {
            interval,
            next: Instant::now(),
        }
    }

    /// Time left until the next frame, zero if it's due.
    pub(super) fn until_next(&self) -> Duration {
        self.next.saturating_duration_since(Instant::now())
    }

    pub(super) fn is_due(&self) -> bool {
        Instant::now() >= self.next
    }

    /// Schedules the following frame.  Missed frames are skipped, not replayed.
    pub(super) fn advance(&mut self) {
        let now = Instant::now();
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_is_due_immediately() {
        let frames = AnimationFrames::new(Duration::from_millis(16));
        assert!(frames.is_due());
        assert_eq!(frames.until_next(), Duration::ZERO);
    }

    #[test]
    fn advance_skips_missed_frames() {
        let mut frames = AnimationFrames::new(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        frames.advance();
        //one interval from now, not one interval from the stale deadline
        assert!(!frames.is_due() || frames.until_next() == Duration::ZERO);
        assert!(frames.until_next() <= Duration::from_millis(1));

        let mut slow = AnimationFrames::new(Duration::from_secs(60));
        slow.advance();
        assert!(!slow.is_due());
        assert!(slow.until_next() > Duration::from_secs(50));
    }
}
