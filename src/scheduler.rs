//! # Scheduled Tasks
//!
//! Cooperative timers for a single control thread. Nothing runs on its own: the
//! owner calls `fire(now)` from its event loop and does the work when it returns
//! true. Cancelling is therefore immediate; once `cancel` returns no further
//! firing can be observed.

use std::time::{Duration, Instant};

/// Repeats every `period` until cancelled
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Option<Instant>,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, next_due: None }
    }

    /// Arm the timer; the first firing is one period from `now`. Re-arming replaces
    /// whatever schedule was active, so at most one is ever live.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// True once per elapsed period. Missed periods collapse into one firing and the
    /// next one is scheduled from `now`.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = Some(now + self.period);
                true
            }
            _ => false,
        }
    }
}

/// An interval timer that stops by itself after a fixed number of firings
#[derive(Debug, Clone)]
pub struct CountedTimer {
    timer: IntervalTimer,
    remaining: usize,
}

impl CountedTimer {
    pub fn start(period: Duration, count: usize, now: Instant) -> Self {
        let mut timer = IntervalTimer::new(period);
        if count > 0 {
            timer.start(now);
        }
        Self { timer, remaining: count }
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        if self.remaining == 0 || !self.timer.fire(now) {
            return false;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.timer.cancel();
        }
        true
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.remaining = 0;
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}
