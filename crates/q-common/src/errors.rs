// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the field-update bootloader
//!
//! This module defines the unified error type used across the workspace.
//! All errors are no_std compatible and carry a stable numeric code so they
//! can be reported over a serial line or blinked out without formatting.

use core::fmt;

/// Result type alias for bootloader operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Cryptographic Errors (0x01xx)
    // =========================================================================
    /// Invalid cryptographic key format or size
    InvalidKey,
    /// Ciphertext is malformed (not block aligned, wrong length)
    InvalidCiphertext,
    /// Known-answer self test did not reproduce the reference output
    SelfTestFailed,

    // =========================================================================
    // Image Errors (0x04xx)
    // =========================================================================
    /// Declared image size exceeds the application region
    ImageTooLarge,
    /// Image CRC does not match the trailer
    ImageCorrupted,
    /// Computed CRC is a blank-flash sentinel
    ImageBlank,
    /// Write would cross into the trailer or leave the region
    ImageOverflow,
    /// Update already in progress
    UpdateInProgress,
    /// Update attempt was abandoned
    UpdateAborted,

    // =========================================================================
    // Protocol Errors (0x06xx)
    // =========================================================================
    /// Frame carried an opcode the bootloader does not know
    UnknownCommand,
    /// Frame was shorter than its command requires
    MalformedFrame,
    /// Transport failed to send or receive
    TransportError,

    // =========================================================================
    // HAL Errors (0x08xx)
    // =========================================================================
    /// Hardware initialization failed
    HardwareInitFailed,
    /// Flash operation failed
    FlashError,
    /// Flash is locked against writes
    FlashLocked,
    /// Timer error
    TimerError,
    /// GPIO error
    GpioError,
    /// UART communication error
    UartError,
    /// Watchdog error
    WatchdogError,

    // =========================================================================
    // Boot Errors (0x0Axx)
    // =========================================================================
    /// Invalid boot configuration
    InvalidBootConfig,
    /// Application vector table is not plausible
    InvalidVectorTable,
    /// Firmware key has not been provisioned
    KeyNotProvisioned,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Buffer is too small for operation
    BufferTooSmall,
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation timed out
    Timeout,
    /// Resource is busy
    Busy,
    /// Feature not implemented on this platform
    NotImplemented,
    /// Invalid state for the operation
    InvalidState,
    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x01xx: Cryptographic errors
    /// - 0x04xx: Image and update errors
    /// - 0x06xx: Protocol errors
    /// - 0x08xx: HAL errors
    /// - 0x0Axx: Boot errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            // Crypto errors (0x01xx)
            Self::InvalidKey => 0x0101,
            Self::InvalidCiphertext => 0x0103,
            Self::SelfTestFailed => 0x010A,

            // Image errors (0x04xx)
            Self::ImageTooLarge => 0x0401,
            Self::ImageCorrupted => 0x0404,
            Self::ImageBlank => 0x0405,
            Self::ImageOverflow => 0x0406,
            Self::UpdateInProgress => 0x0407,
            Self::UpdateAborted => 0x0408,

            // Protocol errors (0x06xx)
            Self::UnknownCommand => 0x0601,
            Self::MalformedFrame => 0x0602,
            Self::TransportError => 0x0603,

            // HAL errors (0x08xx)
            Self::HardwareInitFailed => 0x0801,
            Self::FlashError => 0x0802,
            Self::FlashLocked => 0x0803,
            Self::TimerError => 0x0804,
            Self::GpioError => 0x0805,
            Self::UartError => 0x0807,
            Self::WatchdogError => 0x080B,

            // Boot errors (0x0Axx)
            Self::InvalidBootConfig => 0x0A02,
            Self::InvalidVectorTable => 0x0A05,
            Self::KeyNotProvisioned => 0x0A06,

            // General errors (0xFFxx)
            Self::BufferTooSmall => 0xFF01,
            Self::InvalidParameter => 0xFF02,
            Self::Timeout => 0xFF03,
            Self::Busy => 0xFF04,
            Self::NotImplemented => 0xFF06,
            Self::InvalidState => 0xFF07,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Check if this error means the resident image must not be executed
    #[must_use]
    pub const fn is_image_error(&self) -> bool {
        matches!(
            self,
            Self::ImageTooLarge | Self::ImageCorrupted | Self::ImageBlank | Self::InvalidVectorTable
        )
    }

    /// Get a short description of the error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid cryptographic key",
            Self::InvalidCiphertext => "invalid ciphertext",
            Self::SelfTestFailed => "cipher self test failed",
            Self::ImageTooLarge => "image larger than application region",
            Self::ImageCorrupted => "image CRC mismatch",
            Self::ImageBlank => "image CRC is a blank-flash sentinel",
            Self::ImageOverflow => "write outside application region",
            Self::UpdateInProgress => "update in progress",
            Self::UpdateAborted => "update aborted",
            Self::UnknownCommand => "unknown command",
            Self::MalformedFrame => "malformed frame",
            Self::TransportError => "transport error",
            Self::HardwareInitFailed => "hardware init failed",
            Self::FlashError => "flash error",
            Self::FlashLocked => "flash locked",
            Self::TimerError => "timer error",
            Self::GpioError => "GPIO error",
            Self::UartError => "UART error",
            Self::WatchdogError => "watchdog error",
            Self::InvalidBootConfig => "invalid boot config",
            Self::InvalidVectorTable => "invalid application vector table",
            Self::KeyNotProvisioned => "firmware key not provisioned",
            Self::BufferTooSmall => "buffer too small",
            Self::InvalidParameter => "invalid parameter",
            Self::Timeout => "timeout",
            Self::Busy => "busy",
            Self::NotImplemented => "not implemented",
            Self::InvalidState => "invalid state",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_grouped_by_category() {
        assert_eq!(Error::InvalidKey.code() >> 8, 0x01);
        assert_eq!(Error::ImageCorrupted.code() >> 8, 0x04);
        assert_eq!(Error::MalformedFrame.code() >> 8, 0x06);
        assert_eq!(Error::FlashError.code() >> 8, 0x08);
        assert_eq!(Error::InvalidBootConfig.code() >> 8, 0x0A);
        assert_eq!(Error::InternalError.code(), 0xFFFF);
    }

    #[test]
    fn test_image_errors() {
        assert!(Error::ImageBlank.is_image_error());
        assert!(Error::ImageTooLarge.is_image_error());
        assert!(!Error::FlashError.is_image_error());
        assert!(!Error::UnknownCommand.is_image_error());
    }
}
