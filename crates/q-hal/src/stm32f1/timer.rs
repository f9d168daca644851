// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SysTick millisecond clock
//!
//! SysTick reloads every millisecond. The bootloader runs with interrupts
//! masked, so the tick counter advances when `COUNTFLAG` is observed during
//! a read; callers that need accurate time poll at least once per tick,
//! which the manual-update debounce loop does. Boards that do take the
//! SysTick exception can call [`SysTickClock::on_systick_interrupt`].

// Register access is compiled for the target only
#![cfg_attr(not(target_arch = "arm"), allow(dead_code, unused_imports, unused_variables))]

use crate::error::{HalError, HalResult};
use crate::traits::Clock;
use core::sync::atomic::{AtomicU32, Ordering};

/// Milliseconds since `init`
static MILLIS: AtomicU32 = AtomicU32::new(0);

// SysTick register addresses
const SYST_CSR: u32 = 0xE000_E010; // Control and Status Register
const SYST_RVR: u32 = 0xE000_E014; // Reload Value Register
const SYST_CVR: u32 = 0xE000_E018; // Current Value Register

// SysTick CSR bits
const SYST_CSR_ENABLE: u32 = 1 << 0;
const SYST_CSR_CLKSOURCE: u32 = 1 << 2; // 1 = processor clock
const SYST_CSR_COUNTFLAG: u32 = 1 << 16;

/// Largest SysTick reload value (24 bits)
const SYST_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// SysTick-based 1 kHz clock
pub struct SysTickClock {
    /// Core clock in Hz
    hclk_hz: u32,
    /// Initialized state
    initialized: bool,
}

impl SysTickClock {
    /// Create a clock for the given core frequency
    #[must_use]
    pub const fn new(hclk_hz: u32) -> Self {
        Self {
            hclk_hz,
            initialized: false,
        }
    }

    /// Reload value for a 1 ms period
    #[must_use]
    pub const fn reload_for(hclk_hz: u32) -> Option<u32> {
        let cycles = hclk_hz / Self::FREQUENCY_HZ;
        if cycles == 0 || cycles - 1 > SYST_MAX_RELOAD {
            None
        } else {
            Some(cycles - 1)
        }
    }

    /// Handle SysTick interrupt (increment tick counter)
    pub fn on_systick_interrupt() {
        MILLIS.fetch_add(1, Ordering::Relaxed);
    }

    fn poll_countflag() {
        #[cfg(target_arch = "arm")]
        {
            // SAFETY: SYST_CSR is the ARM Cortex-M SysTick control register.
            // Reading it clears COUNTFLAG, so each wrap is counted once.
            let csr = unsafe { core::ptr::read_volatile(SYST_CSR as *const u32) };
            if csr & SYST_CSR_COUNTFLAG != 0 {
                MILLIS.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Clock for SysTickClock {
    const FREQUENCY_HZ: u32 = 1_000;

    fn init(&mut self) -> HalResult<()> {
        if self.initialized {
            return Ok(());
        }

        let reload = Self::reload_for(self.hclk_hz).ok_or(HalError::TimerError)?;

        #[cfg(target_arch = "arm")]
        // SAFETY: SysTick registers are ARM Cortex-M architecturally-defined.
        // The counter is stopped while reconfigured, then started without
        // TICKINT so no exception handler is required.
        unsafe {
            use core::ptr;
            ptr::write_volatile(SYST_CSR as *mut u32, 0);
            ptr::write_volatile(SYST_RVR as *mut u32, reload);
            ptr::write_volatile(SYST_CVR as *mut u32, 0);
            ptr::write_volatile(SYST_CSR as *mut u32, SYST_CSR_ENABLE | SYST_CSR_CLKSOURCE);
        }

        MILLIS.store(0, Ordering::Relaxed);
        self.initialized = true;
        Ok(())
    }

    fn ticks(&self) -> u64 {
        if !self.initialized {
            return 0;
        }
        Self::poll_countflag();
        u64::from(MILLIS.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_values() {
        assert_eq!(SysTickClock::reload_for(8_000_000), Some(7_999));
        assert_eq!(SysTickClock::reload_for(72_000_000), Some(71_999));
        assert_eq!(SysTickClock::reload_for(500), None);
    }

    #[test]
    fn test_uninitialized_reads_zero() {
        let clock = SysTickClock::new(8_000_000);
        assert_eq!(clock.ticks(), 0);
    }
}
