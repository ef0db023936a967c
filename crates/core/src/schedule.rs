//! Trailing-edge debouncing of scan requests.
//!
//! Host notifications arrive in bursts (a page of results renders dozens of
//! cards in a few milliseconds). The [`Debouncer`] folds a burst into one
//! scan: the first trigger arms a deadline `window` in the future and every
//! trigger before that deadline joins it. A trigger that arrives while a scan
//! is running sets a single pending flag, so there is never more than one
//! active and one queued scan.
//!
//! The debouncer is a plain state machine over [`Instant`]s; it does not sleep.
//! The session loop asks for [`Debouncer::deadline`] and sleeps until then.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
    running: bool,
    pending: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None, running: false, pending: false }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Registers a trigger at `now`.
    ///
    /// Returns `true` if this trigger armed a new deadline or pending flag,
    /// `false` if it was folded into one that already exists.
    pub fn trigger(&mut self, now: Instant) -> bool {
        if self.running {
            return !std::mem::replace(&mut self.pending, true);
        }
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.window);
        true
    }

    /// Arms a deadline at an explicit delay, keeping an earlier one if armed.
    pub fn schedule_in(&mut self, now: Instant, delay: Duration) {
        let at = now + delay;
        self.deadline = Some(self.deadline.map_or(at, |current| current.min(at)));
    }

    /// When the next scan is due, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether an armed deadline has passed at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.running && self.deadline.is_some_and(|d| d <= now)
    }

    /// Claims the scan slot if the deadline has passed.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.deadline = None;
        self.running = true;
        true
    }

    /// Claims the scan slot right away, dropping any armed deadline.
    ///
    /// Fails only if a scan is already running.
    pub fn begin_now(&mut self) -> bool {
        if self.running {
            self.pending = true;
            return false;
        }
        self.deadline = None;
        self.running = true;
        true
    }

    /// Releases the scan slot. A trigger that came in meanwhile arms a fresh
    /// deadline from `now`.
    pub fn finish(&mut self, now: Instant) {
        self.running = false;
        if std::mem::take(&mut self.pending) {
            self.deadline = Some(now + self.window);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Drops any armed deadline and pending flag.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = false;
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}
