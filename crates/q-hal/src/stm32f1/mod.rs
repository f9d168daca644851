// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32F1 Hardware Abstraction Layer
//!
//! Register-level drivers for the STM32F103 (ARM Cortex-M3) used by the
//! field-update bootloader.
//!
//! # Supported Features
//!
//! - Internal flash (half-word programming, 2KB pages on high-density parts)
//! - GPIO (CRL/CRH configuration, BSRR atomic set/reset)
//! - SysTick millisecond clock
//! - Independent watchdog (IWDG)
//! - USART1 byte transport
//! - Backup-domain mailbox register

pub mod backup;
pub mod flash;
pub mod gpio;
pub mod timer;
pub mod uart;
pub mod watchdog;

// Re-export main types
pub use backup::BackupMailbox;
pub use flash::Stm32f1Flash;
pub use gpio::{GpioPort, PinMode, Stm32f1GpioPin};
pub use timer::SysTickClock;
pub use uart::Stm32f1Usart;
pub use watchdog::Stm32f1Iwdg;

// =============================================================================
// Reset
// =============================================================================

/// Application Interrupt and Reset Control Register
const SCB_AIRCR: u32 = 0xE000_ED0C;
const AIRCR_VECTKEY: u32 = 0x05FA_0000;
const AIRCR_SYSRESETREQ: u32 = 1 << 2;

/// Request a system reset and wait for it
pub fn system_reset() -> ! {
    #[cfg(target_arch = "arm")]
    // SAFETY: writing VECTKEY with SYSRESETREQ to SCB_AIRCR is the
    // architectural Cortex-M reset request. The barrier makes sure earlier
    // writes complete first.
    unsafe {
        core::arch::asm!("dsb sy", options(nomem, nostack, preserves_flags));
        core::ptr::write_volatile(SCB_AIRCR as *mut u32, AIRCR_VECTKEY | AIRCR_SYSRESETREQ);
        core::arch::asm!("dsb sy", options(nomem, nostack, preserves_flags));
    }

    #[cfg(not(target_arch = "arm"))]
    let _ = (SCB_AIRCR, AIRCR_VECTKEY, AIRCR_SYSRESETREQ);

    loop {
        core::hint::spin_loop();
    }
}

// =============================================================================
// RCC
// =============================================================================

/// RCC register base
const RCC_BASE: u32 = 0x4002_1000;

/// APB2 peripheral clock enable register
const RCC_APB2ENR: u32 = RCC_BASE + 0x18;

/// APB1 peripheral clock enable register
const RCC_APB1ENR: u32 = RCC_BASE + 0x1C;

/// Peripheral bus a clock enable bit lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bus {
    Apb1,
    Apb2,
}

/// Set a peripheral clock enable bit
pub(crate) fn enable_clock(bus: Bus, bit: u32) {
    let reg = match bus {
        Bus::Apb1 => RCC_APB1ENR,
        Bus::Apb2 => RCC_APB2ENR,
    };

    #[cfg(target_arch = "arm")]
    // SAFETY: RCC_APBxENR are architecturally-defined STM32F1 clock enable
    // registers. Read-modify-write preserves the other enables; the trailing
    // read gives the clock two cycles to settle before first access.
    unsafe {
        let val = core::ptr::read_volatile(reg as *const u32);
        core::ptr::write_volatile(reg as *mut u32, val | (1 << bit));
        let _ = core::ptr::read_volatile(reg as *const u32);
    }

    #[cfg(not(target_arch = "arm"))]
    let _ = (reg, bit);
}

/// STM32F1 clock configuration
///
/// The bootloader runs from the reset clock tree; these values only feed
/// baud-rate and tick calculations.
#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    /// System clock frequency in Hz
    pub sysclk_hz: u32,
    /// APB1 clock frequency in Hz
    pub pclk1_hz: u32,
    /// APB2 clock frequency in Hz
    pub pclk2_hz: u32,
}

impl ClockConfig {
    /// Reset state: HSI at 8 MHz, no prescaling
    pub const HSI_8MHZ: Self = Self {
        sysclk_hz: 8_000_000,
        pclk1_hz: 8_000_000,
        pclk2_hz: 8_000_000,
    };
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::HSI_8MHZ
    }
}
