// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Hardware Abstraction Layer for the Qbitel field-update bootloader
//!
//! The bootloader core is written against the traits in [`traits`]; a board
//! crate or binary picks one backend:
//!
//! - **STM32F1**: ARM Cortex-M3 register-level drivers (`stm32f1` feature)
//! - **Simulation**: RAM-backed flash and scripted peripherals (`sim` feature)
//!
//! # Architecture
//!
//! 1. **Traits**: Platform-agnostic interfaces (`traits` module)
//! 2. **Drivers**: Platform-specific implementations
//! 3. **Board glue**: [`panel`] and [`housekeeping`] compose drivers into the
//!    collaborators the update loop consumes
//!
//! # Security
//!
//! - Flash stays locked except while an update is being received
//! - Program and erase modes are scoped by [`ProgramBracket`] and
//!   [`EraseBracket`] so an early return cannot leave the controller armed

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod framing;
pub mod housekeeping;
pub mod panel;
pub mod traits;

#[cfg(feature = "sim")]
pub mod sim;

#[cfg(feature = "stm32f1")]
pub mod stm32f1;

// Re-export main traits
pub use error::{HalError, HalResult};
pub use traits::*;

/// Platform identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// STM32F1 (Cortex-M3)
    Stm32F1,
    /// Host simulation
    Simulation,
    /// No backend selected
    Unknown,
}

impl Platform {
    /// Get the current platform
    #[must_use]
    pub const fn current() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "stm32f1")] {
                Self::Stm32F1
            } else if #[cfg(feature = "sim")] {
                Self::Simulation
            } else {
                Self::Unknown
            }
        }
    }

    /// Short name for boot logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stm32F1 => "stm32f1",
            Self::Simulation => "sim",
            Self::Unknown => "unknown",
        }
    }

    /// Get the flash base address for this platform
    #[must_use]
    pub const fn flash_base(&self) -> u32 {
        match self {
            Self::Stm32F1 | Self::Simulation => 0x0800_0000,
            Self::Unknown => 0x0000_0000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_selected_by_features() {
        // Tests always build with `sim`; `stm32f1` wins when both are on
        let platform = Platform::current();
        assert_ne!(platform, Platform::Unknown);
        assert_eq!(platform.flash_base(), 0x0800_0000);
    }
}
