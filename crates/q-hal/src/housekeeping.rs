// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Watchdog-feeding scheduler
//!
//! The update loop has no background tasks of its own beyond keeping the
//! independent watchdog fed while it waits for the host. [`Housekeeping`]
//! wraps a [`WatchdogInterface`] into the [`Scheduler`] the loop pumps.

use crate::error::HalResult;
use crate::traits::{Scheduler, WatchdogInterface};

/// Scheduler whose only job is feeding the watchdog
pub struct Housekeeping<W: WatchdogInterface> {
    watchdog: W,
    timeout_ms: u32,
    rounds: u32,
    feed_failures: u32,
}

impl<W: WatchdogInterface> Housekeeping<W> {
    /// Wrap a watchdog that will be armed with `timeout_ms` on `init`
    pub const fn new(watchdog: W, timeout_ms: u32) -> Self {
        Self {
            watchdog,
            timeout_ms,
            rounds: 0,
            feed_failures: 0,
        }
    }

    /// Number of completed `work` rounds
    #[must_use]
    pub const fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Number of failed feeds
    #[must_use]
    pub const fn feed_failures(&self) -> u32 {
        self.feed_failures
    }

    /// Access the wrapped watchdog
    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }
}

impl<W: WatchdogInterface> Scheduler for Housekeeping<W> {
    fn init(&mut self) -> HalResult<()> {
        self.watchdog.init(self.timeout_ms)
    }

    fn work(&mut self) {
        if self.watchdog.feed().is_err() {
            self.feed_failures = self.feed_failures.saturating_add(1);
        }
        self.rounds = self.rounds.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimWatchdog;

    #[test]
    fn test_work_feeds_watchdog() {
        let mut sched = Housekeeping::new(SimWatchdog::new(), 2000);
        sched.init().unwrap();
        sched.work();
        sched.work();

        assert_eq!(sched.watchdog().armed_timeout_ms(), Some(2000));
        assert_eq!(sched.watchdog().feeds(), 2);
        assert_eq!(sched.rounds(), 2);
        assert_eq!(sched.feed_failures(), 0);
    }

    #[test]
    fn test_feed_before_init_counts_failure() {
        let mut sched = Housekeeping::new(SimWatchdog::new(), 2000);
        sched.work();
        assert_eq!(sched.feed_failures(), 1);
    }
}
