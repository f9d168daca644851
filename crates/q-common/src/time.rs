// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Time utilities
//!
//! Monotonic tick stamps and deadlines used for the manual-update debounce
//! window and for log timestamps. Tick resolution is whatever the board
//! clock provides; [`TickFrequency`] converts.

use core::ops::{Add, Sub};

/// System tick counter (platform-specific resolution)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(u64);

impl Ticks {
    /// Create from raw tick count
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick count
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Calculate elapsed ticks since this timestamp
    #[must_use]
    pub const fn elapsed(&self, now: Self) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Check if duration has elapsed since this timestamp
    #[must_use]
    pub const fn has_elapsed(&self, now: Self, duration: u64) -> bool {
        self.elapsed(now) >= duration
    }
}

impl From<u64> for Ticks {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Ticks> for u64 {
    fn from(value: Ticks) -> Self {
        value.0
    }
}

impl Add<u64> for Ticks {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub<Ticks> for Ticks {
    type Output = u64;

    fn sub(self, rhs: Ticks) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Tick frequency for converting between ticks and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickFrequency {
    /// Ticks per second
    hz: u32,
}

impl TickFrequency {
    /// Create from frequency in Hz
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        Self { hz }
    }

    /// 1 kHz (1 tick = 1 millisecond)
    pub const KHZ_1: Self = Self { hz: 1_000 };

    /// Ticks per second
    #[must_use]
    pub const fn hz(&self) -> u32 {
        self.hz
    }

    /// Convert ticks to milliseconds
    #[must_use]
    pub const fn ticks_to_millis(&self, ticks: u64) -> u64 {
        if self.hz == 0 {
            return 0;
        }
        (ticks * 1_000) / (self.hz as u64)
    }

    /// Convert milliseconds to ticks, rounding up so a window is never short
    #[must_use]
    pub const fn millis_to_ticks(&self, millis: u32) -> u64 {
        ((millis as u64) * (self.hz as u64) + 999) / 1_000
    }
}

/// Simple deadline tracker
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Ticks,
    timeout: u64,
}

impl Deadline {
    /// Create a new deadline
    #[must_use]
    pub const fn new(start: Ticks, timeout_ticks: u64) -> Self {
        Self {
            start,
            timeout: timeout_ticks,
        }
    }

    /// Create a deadline `millis` after `start`
    #[must_use]
    pub const fn after_millis(start: Ticks, millis: u32, frequency: TickFrequency) -> Self {
        Self::new(start, frequency.millis_to_ticks(millis))
    }

    /// Check if the deadline has expired
    #[must_use]
    pub const fn is_expired(&self, now: Ticks) -> bool {
        self.start.elapsed(now) >= self.timeout
    }

    /// Get remaining ticks until deadline (0 if expired)
    #[must_use]
    pub const fn remaining(&self, now: Ticks) -> u64 {
        let elapsed = self.start.elapsed(now);
        if elapsed >= self.timeout {
            0
        } else {
            self.timeout - elapsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::after_millis(Ticks::new(100), 1000, TickFrequency::KHZ_1);
        assert!(!deadline.is_expired(Ticks::new(100)));
        assert!(!deadline.is_expired(Ticks::new(1099)));
        assert!(deadline.is_expired(Ticks::new(1100)));
        assert_eq!(deadline.remaining(Ticks::new(600)), 500);
    }

    #[test]
    fn test_millis_rounds_up() {
        let slow = TickFrequency::from_hz(3);
        // 1000 ms at 3 Hz is exactly 3 ticks; 1 ms still needs a whole tick
        assert_eq!(slow.millis_to_ticks(1000), 3);
        assert_eq!(slow.millis_to_ticks(1), 1);
    }

    #[test]
    fn test_clock_going_backwards_saturates() {
        let later = Ticks::new(50);
        assert_eq!(later.elapsed(Ticks::new(10)), 0);
        assert_eq!(Ticks::new(10) - later, 0);
    }
}
