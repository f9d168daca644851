// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL error types

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Hardware not initialized
    NotInitialized,
    /// Hardware initialization failed
    InitFailed,
    /// Flash controller reported an error not covered below
    FlashError,
    /// Flash is locked
    FlashLocked,
    /// Flash address out of bounds
    FlashOutOfBounds,
    /// Flash address not aligned to the programming granularity
    FlashMisaligned,
    /// Flash erase failed
    FlashEraseFailed,
    /// Flash programming failed (target not erased or PGERR)
    FlashWriteFailed,
    /// Flash region is write protected (WRPRTERR)
    FlashWriteProtected,
    /// Flash operation timeout
    FlashTimeout,
    /// Flash mode bracket used out of order
    FlashModeConflict,
    /// Timer error
    TimerError,
    /// GPIO error
    GpioError,
    /// UART error
    UartError,
    /// UART framing or overrun
    UartOverrun,
    /// Watchdog error
    WatchdogError,
    /// Invalid parameter
    InvalidParameter,
    /// Operation timeout
    Timeout,
    /// Hardware busy
    Busy,
    /// Operation not supported
    NotSupported,
    /// Invalid operation for current state
    InvalidOperation,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotInitialized => 0x0801,
            Self::InitFailed => 0x0802,
            Self::FlashError => 0x0810,
            Self::FlashLocked => 0x0811,
            Self::FlashOutOfBounds => 0x0812,
            Self::FlashEraseFailed => 0x0813,
            Self::FlashWriteFailed => 0x0814,
            Self::FlashMisaligned => 0x0815,
            Self::FlashTimeout => 0x0816,
            Self::FlashWriteProtected => 0x0817,
            Self::FlashModeConflict => 0x0818,
            Self::TimerError => 0x0830,
            Self::GpioError => 0x0840,
            Self::UartError => 0x0870,
            Self::UartOverrun => 0x0871,
            Self::WatchdogError => 0x08A0,
            Self::InvalidParameter => 0x08F0,
            Self::Timeout => 0x08F1,
            Self::Busy => 0x08F2,
            Self::InvalidOperation => 0x08F4,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not initialized",
            Self::InitFailed => "initialization failed",
            Self::FlashError => "flash error",
            Self::FlashLocked => "flash locked",
            Self::FlashOutOfBounds => "flash address out of bounds",
            Self::FlashMisaligned => "flash address misaligned",
            Self::FlashEraseFailed => "flash erase failed",
            Self::FlashWriteFailed => "flash write failed",
            Self::FlashWriteProtected => "flash write protected",
            Self::FlashTimeout => "flash operation timeout",
            Self::FlashModeConflict => "flash mode bracket conflict",
            Self::TimerError => "timer error",
            Self::GpioError => "GPIO error",
            Self::UartError => "UART error",
            Self::UartOverrun => "UART overrun",
            Self::WatchdogError => "watchdog error",
            Self::InvalidParameter => "invalid parameter",
            Self::Timeout => "timeout",
            Self::Busy => "busy",
            Self::NotSupported => "not supported",
            Self::InvalidOperation => "invalid operation for current state",
        }
    }

    /// True for errors that mean the flash controller refused the operation
    #[must_use]
    pub const fn is_flash_fault(&self) -> bool {
        matches!(
            self,
            Self::FlashError
                | Self::FlashEraseFailed
                | Self::FlashWriteFailed
                | Self::FlashWriteProtected
                | Self::FlashTimeout
        )
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<HalError> for q_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::NotInitialized | HalError::InitFailed => Self::HardwareInitFailed,
            HalError::FlashLocked | HalError::FlashWriteProtected => Self::FlashLocked,
            HalError::FlashOutOfBounds => Self::ImageOverflow,
            HalError::FlashError
            | HalError::FlashMisaligned
            | HalError::FlashEraseFailed
            | HalError::FlashWriteFailed
            | HalError::FlashTimeout
            | HalError::FlashModeConflict => Self::FlashError,
            HalError::TimerError => Self::TimerError,
            HalError::GpioError => Self::GpioError,
            HalError::UartError | HalError::UartOverrun => Self::UartError,
            HalError::WatchdogError => Self::WatchdogError,
            HalError::InvalidParameter => Self::InvalidParameter,
            HalError::Timeout => Self::Timeout,
            HalError::Busy => Self::Busy,
            HalError::NotSupported => Self::NotImplemented,
            HalError::InvalidOperation => Self::InvalidState,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_errors_map_to_common() {
        assert_eq!(q_common::Error::from(HalError::FlashEraseFailed), q_common::Error::FlashError);
        assert_eq!(q_common::Error::from(HalError::FlashWriteProtected), q_common::Error::FlashLocked);
        assert_eq!(q_common::Error::from(HalError::FlashOutOfBounds), q_common::Error::ImageOverflow);
    }

    #[test]
    fn test_flash_fault_classification() {
        assert!(HalError::FlashWriteFailed.is_flash_fault());
        assert!(!HalError::FlashLocked.is_flash_fault());
        assert!(!HalError::UartOverrun.is_flash_fault());
    }
}
