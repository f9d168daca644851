// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32F1 Independent Watchdog (IWDG)
//!
//! Clocked from the ~40 kHz LSI. Once started it cannot be stopped except
//! by reset, so the update loop must keep feeding it while it waits for the
//! host.

// Register access is compiled for the target only
#![cfg_attr(not(target_arch = "arm"), allow(dead_code, unused_imports, unused_variables))]

use core::ptr;

use crate::error::{HalError, HalResult};
use crate::traits::WatchdogInterface;

// ============================================================================
// IWDG Configuration
// ============================================================================

/// IWDG register base address
const IWDG_BASE: u32 = 0x4000_3000;

const IWDG_KR: u32 = IWDG_BASE; // Key register
const IWDG_PR: u32 = IWDG_BASE + 0x04; // Prescaler register
const IWDG_RLR: u32 = IWDG_BASE + 0x08; // Reload register
const IWDG_SR: u32 = IWDG_BASE + 0x0C; // Status register

// IWDG Key values
const IWDG_KEY_RELOAD: u32 = 0xAAAA;
const IWDG_KEY_ENABLE: u32 = 0xCCCC;
const IWDG_KEY_ACCESS: u32 = 0x5555;

// IWDG Status bits
const IWDG_SR_PVU: u32 = 1 << 0; // Prescaler update
const IWDG_SR_RVU: u32 = 1 << 1; // Reload update

/// IWDG LSI frequency on STM32F1 (nominal)
const LSI_FREQ_HZ: u32 = 40_000;

/// Maximum IWDG reload value
const IWDG_MAX_RELOAD: u16 = 0x0FFF;

/// IWDG prescaler options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IwdgPrescaler {
    /// Divide by 4
    Div4 = 0,
    /// Divide by 8
    Div8 = 1,
    /// Divide by 16
    Div16 = 2,
    /// Divide by 32
    Div32 = 3,
    /// Divide by 64
    Div64 = 4,
    /// Divide by 128
    Div128 = 5,
    /// Divide by 256
    Div256 = 6,
}

impl IwdgPrescaler {
    const ALL: [Self; 7] = [
        Self::Div4,
        Self::Div8,
        Self::Div16,
        Self::Div32,
        Self::Div64,
        Self::Div128,
        Self::Div256,
    ];

    /// Get the divisor value
    #[must_use]
    pub const fn divisor(self) -> u32 {
        4 << (self as u32)
    }
}

/// Independent Watchdog driver
pub struct Stm32f1Iwdg {
    prescaler: IwdgPrescaler,
    reload: u16,
    started: bool,
}

impl Stm32f1Iwdg {
    /// Create a new IWDG instance
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prescaler: IwdgPrescaler::Div32,
            reload: IWDG_MAX_RELOAD,
            started: false,
        }
    }

    /// Smallest prescaler and matching reload for a timeout
    ///
    /// timeout = (reload + 1) * prescaler / LSI
    #[must_use]
    pub fn calculate_config(timeout_ms: u32) -> Option<(IwdgPrescaler, u16)> {
        IwdgPrescaler::ALL.into_iter().find_map(|prescaler| {
            let reload = ((u64::from(timeout_ms) * u64::from(LSI_FREQ_HZ))
                / (u64::from(prescaler.divisor()) * 1000))
                .saturating_sub(1);
            u16::try_from(reload)
                .ok()
                .filter(|&r| r <= IWDG_MAX_RELOAD)
                .map(|r| (prescaler, r))
        })
    }

    /// Check if watchdog is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.started
    }

    /// Wait for register updates to complete
    #[cfg(target_arch = "arm")]
    fn wait_ready() -> HalResult<()> {
        let mut timeout = 100_000u32;
        loop {
            // SAFETY: IWDG_SR is a read-only status register
            let sr = unsafe { ptr::read_volatile(IWDG_SR as *const u32) };
            if sr & (IWDG_SR_PVU | IWDG_SR_RVU) == 0 {
                return Ok(());
            }
            timeout = timeout.saturating_sub(1);
            if timeout == 0 {
                return Err(HalError::WatchdogError);
            }
        }
    }
}

impl Default for Stm32f1Iwdg {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogInterface for Stm32f1Iwdg {
    fn init(&mut self, timeout_ms: u32) -> HalResult<()> {
        if self.started {
            return Err(HalError::InvalidOperation);
        }

        let (prescaler, reload) =
            Self::calculate_config(timeout_ms).ok_or(HalError::InvalidParameter)?;
        self.prescaler = prescaler;
        self.reload = reload;

        #[cfg(target_arch = "arm")]
        {
            // SAFETY: IWDG key, prescaler and reload registers at 0x4000_3000.
            // The access key unlocks PR/RLR; the enable key starts the counter,
            // after which it cannot be stopped except by reset.
            unsafe {
                ptr::write_volatile(IWDG_KR as *mut u32, IWDG_KEY_ACCESS);
            }
            Self::wait_ready()?;
            // SAFETY: see above
            unsafe {
                ptr::write_volatile(IWDG_PR as *mut u32, self.prescaler as u32);
                ptr::write_volatile(IWDG_RLR as *mut u32, u32::from(self.reload));
            }
            Self::wait_ready()?;
            // SAFETY: see above
            unsafe {
                ptr::write_volatile(IWDG_KR as *mut u32, IWDG_KEY_RELOAD);
                ptr::write_volatile(IWDG_KR as *mut u32, IWDG_KEY_ENABLE);
            }
        }

        self.started = true;
        Ok(())
    }

    fn feed(&mut self) -> HalResult<()> {
        if !self.started {
            return Err(HalError::NotInitialized);
        }

        #[cfg(target_arch = "arm")]
        // SAFETY: writing the reload key reloads the down-counter
        unsafe {
            ptr::write_volatile(IWDG_KR as *mut u32, IWDG_KEY_RELOAD);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iwdg_config_calculation() {
        // 100 ms fits with the smallest prescaler: 100 * 40 / 4 - 1
        assert_eq!(
            Stm32f1Iwdg::calculate_config(100),
            Some((IwdgPrescaler::Div4, 999))
        );

        let (prescaler, reload) = Stm32f1Iwdg::calculate_config(2000).unwrap();
        assert_eq!(prescaler, IwdgPrescaler::Div32);
        assert_eq!(reload, 2499);

        // Beyond 256 * 4096 / 40 kHz
        assert_eq!(Stm32f1Iwdg::calculate_config(30_000), None);
    }

    #[test]
    fn test_iwdg_prescaler_divisor() {
        assert_eq!(IwdgPrescaler::Div4.divisor(), 4);
        assert_eq!(IwdgPrescaler::Div32.divisor(), 32);
        assert_eq!(IwdgPrescaler::Div256.divisor(), 256);
    }

    #[test]
    fn test_feed_before_start() {
        let mut iwdg = Stm32f1Iwdg::new();
        assert_eq!(iwdg.feed(), Err(HalError::NotInitialized));
        assert!(!iwdg.is_running());
    }
}
