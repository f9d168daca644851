// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Logging infrastructure for the bootloader
//!
//! A lightweight, no_std logging system. Records go into a fixed-capacity
//! circular buffer owned by whoever logs; nothing is allocated and nothing is
//! written to a console unless a caller drains the buffer into a
//! [`core::fmt::Write`] sink.
//!
//! # Security
//!
//! - Key material and decrypted image bytes must NEVER be logged
//! - An image failing validation is a state, not an error; log it at
//!   `Debug` or lower

use core::fmt::{self, Write};
use heapless::String;

/// Maximum log message length
pub const MAX_LOG_MESSAGE_LEN: usize = 96;

/// Default log buffer capacity (number of entries)
pub const LOG_BUFFER_SIZE: usize = 32;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that abandon an update attempt
    Error = 0,
    /// Unexpected but recoverable conditions
    Warn = 1,
    /// Boot decisions
    Info = 2,
    /// Per-attempt detail
    Debug = 3,
    /// Per-frame detail
    Trace = 4,
}

impl LogLevel {
    /// Get the log level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Get a short prefix for the log level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log record
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Clock ticks at the time of logging
    pub timestamp: u64,
    /// Component tag
    pub module: &'static str,
    /// Message, truncated to [`MAX_LOG_MESSAGE_LEN`]
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl LogEntry {
    /// Create a new log entry from a preformatted message
    #[must_use]
    pub fn new(level: LogLevel, timestamp: u64, module: &'static str, message: &str) -> Self {
        let mut msg = String::new();
        for ch in message.chars() {
            if msg.push(ch).is_err() {
                break;
            }
        }

        Self {
            level,
            timestamp,
            module,
            message: msg,
        }
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:010}] {} [{}] {}",
            self.timestamp,
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

/// Fixed-capacity circular log buffer; the oldest entry is overwritten first
pub struct LogBuffer<const N: usize = LOG_BUFFER_SIZE> {
    entries: [Option<LogEntry>; N],
    write_index: usize,
    count: usize,
    dropped: u32,
    min_level: LogLevel,
}

impl<const N: usize> LogBuffer<N> {
    const EMPTY: Option<LogEntry> = None;

    /// Create a new empty log buffer recording `Info` and above
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [Self::EMPTY; N],
            write_index: 0,
            count: 0,
            dropped: 0,
            min_level: LogLevel::Info,
        }
    }

    /// Create a buffer with an explicit minimum level
    #[must_use]
    pub const fn with_level(min_level: LogLevel) -> Self {
        let mut buffer = Self::new();
        buffer.min_level = min_level;
        buffer
    }

    /// Set the minimum log level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Get the minimum log level
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Check if a log level should be recorded
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Store an entry, evicting the oldest one when full
    pub fn write(&mut self, entry: LogEntry) {
        if N == 0 || !self.should_log(entry.level) {
            return;
        }

        if self.count == N {
            self.dropped = self.dropped.saturating_add(1);
        } else {
            self.count += 1;
        }
        self.entries[self.write_index] = Some(entry);
        self.write_index = (self.write_index + 1) % N;
    }

    /// Log with format arguments
    pub fn log(&mut self, level: LogLevel, timestamp: u64, module: &'static str, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }

        let mut message = String::<MAX_LOG_MESSAGE_LEN>::new();
        // Overlong messages are cut at capacity
        let _ = message.write_fmt(args);

        self.write(LogEntry {
            level,
            timestamp,
            module,
            message,
        });
    }

    /// Get the number of entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Check if buffer is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of entries evicted because the buffer was full
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        if self.count == 0 {
            return None;
        }
        let index = (self.write_index + N - 1) % N;
        self.entries[index].as_ref()
    }

    /// Count entries at `level` or more severe
    #[must_use]
    pub fn count_at_least(&self, level: LogLevel) -> usize {
        self.iter().filter(|entry| entry.level <= level).count()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.write_index = 0;
        self.count = 0;
        self.dropped = 0;
    }

    /// Write every entry, oldest first, one per line
    ///
    /// # Errors
    ///
    /// Propagates the sink's formatting error.
    pub fn drain_to<W: Write>(&mut self, sink: &mut W) -> fmt::Result {
        for entry in self.iter() {
            writeln!(sink, "{entry}")?;
        }
        self.clear();
        Ok(())
    }

    /// Iterate over entries (oldest first)
    pub fn iter(&self) -> LogBufferIter<'_, N> {
        LogBufferIter {
            buffer: self,
            index: 0,
            remaining: self.count,
        }
    }
}

impl<const N: usize> Default for LogBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over log buffer entries
pub struct LogBufferIter<'a, const N: usize> {
    buffer: &'a LogBuffer<N>,
    index: usize,
    remaining: usize,
}

impl<'a, const N: usize> Iterator for LogBufferIter<'a, N> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let start_index = if self.buffer.count < N {
            0
        } else {
            self.buffer.write_index
        };

        let actual_index = (start_index + self.index) % N;
        self.index += 1;
        self.remaining -= 1;

        self.buffer.entries[actual_index].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Error, $ts, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Warn, $ts, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Info, $ts, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Debug, $ts, $module, format_args!($($arg)*))
    };
}

/// Log a trace-level message
#[macro_export]
macro_rules! log_trace {
    ($buffer:expr, $ts:expr, $module:expr, $($arg:tt)*) => {
        $buffer.log($crate::log::LogLevel::Trace, $ts, $module, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filtering() {
        let mut buffer: LogBuffer<4> = LogBuffer::new();
        crate::log_debug!(buffer, 1, "test", "hidden {}", 1);
        crate::log_info!(buffer, 2, "test", "shown {}", 2);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last().map(|e| e.message.as_str()), Some("shown 2"));
    }

    #[test]
    fn test_wraparound_keeps_newest() {
        let mut buffer: LogBuffer<3> = LogBuffer::with_level(LogLevel::Trace);
        for i in 0..5u64 {
            crate::log_trace!(buffer, i, "test", "entry");
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.dropped(), 2);
        let stamps: [u64; 3] = {
            let mut out = [0; 3];
            for (slot, entry) in out.iter_mut().zip(buffer.iter()) {
                *slot = entry.timestamp;
            }
            out
        };
        assert_eq!(stamps, [2, 3, 4]);
    }

    #[test]
    fn test_message_truncated() {
        let raw = [b'x'; MAX_LOG_MESSAGE_LEN + 10];
        let long = core::str::from_utf8(&raw).unwrap();
        let entry = LogEntry::new(LogLevel::Warn, 0, "test", long);
        assert_eq!(entry.message.len(), MAX_LOG_MESSAGE_LEN);
    }
}
