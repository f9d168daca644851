// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Application handoff
//!
//! The application image starts with a Cortex-M vector table:
//!
//! ```text
//! +0x0000: initial main stack pointer
//! +0x0004: reset vector (Thumb bit set)
//! ```

#[cfg(target_arch = "arm")]
use core::ptr;
use q_common::config::FlashLayout;
use q_common::{Error, Result};
use q_hal::{FlashInterface, Jumper};

/// SCB vector table offset register
#[cfg(target_arch = "arm")]
const SCB_VTOR: u32 = 0xE000_ED08;

/// SRAM base
pub const RAM_BASE: u32 = 0x2000_0000;

/// SRAM size on STM32F103xE (64 KB)
pub const RAM_SIZE: u32 = 64 * 1024;

/// First two words of the application's vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorTable {
    /// Initial main stack pointer
    pub initial_sp: u32,
    /// Reset handler address
    pub reset_vector: u32,
}

impl VectorTable {
    /// Read the table at `address`
    ///
    /// # Errors
    ///
    /// Propagates flash read errors.
    pub fn read<F: FlashInterface>(flash: &F, address: u32) -> Result<Self> {
        Ok(Self {
            initial_sp: flash.read_u32(address)?,
            reset_vector: flash.read_u32(address + 4)?,
        })
    }

    /// Check the table could belong to an image in `layout`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVectorTable`] if the stack pointer is not a
    /// word-aligned address in SRAM, or the reset vector is not a Thumb
    /// address inside the image region.
    pub fn validate(&self, layout: &FlashLayout) -> Result<()> {
        let sp_ok = self.initial_sp % 4 == 0
            && self.initial_sp > RAM_BASE
            && self.initial_sp <= RAM_BASE + RAM_SIZE;

        let entry = self.reset_vector & !1;
        let entry_ok = self.reset_vector & 1 == 1
            && entry >= layout.app_start
            && entry < layout.trailer_address();

        if sp_ok && entry_ok {
            Ok(())
        } else {
            Err(Error::InvalidVectorTable)
        }
    }
}

/// Cortex-M3 jump: relocate VTOR, load MSP, branch to the reset vector
#[derive(Debug, Clone, Copy, Default)]
pub struct CortexMJumper;

impl Jumper for CortexMJumper {
    fn jump(&self, address: u32) -> ! {
        dsb();
        isb();

        #[cfg(target_arch = "arm")]
        // SAFETY: `address` is the application start in memory-mapped flash
        // and the caller only jumps after the image passed its integrity
        // check. VTOR is the architecturally defined SCB register and the
        // application's table sits at its page start. MSP is replaced right
        // before a branch that never returns, so no bootloader stack frame
        // is used afterwards.
        unsafe {
            let initial_sp = ptr::read_volatile(address as *const u32);
            let reset_vector = ptr::read_volatile((address + 4) as *const u32);

            ptr::write_volatile(SCB_VTOR as *mut u32, address);
            dsb();
            core::arch::asm!(
                "msr msp, {sp}",
                sp = in(reg) initial_sp,
                options(nomem, nostack)
            );
            let entry: extern "C" fn() -> ! = core::mem::transmute(reset_vector as usize);
            entry();
        }

        // Host builds have no application to enter
        #[cfg(not(target_arch = "arm"))]
        {
            let _ = address;
            loop {
                core::hint::spin_loop();
            }
        }
    }
}

/// Data Synchronization Barrier
#[inline(always)]
fn dsb() {
    #[cfg(target_arch = "arm")]
    // SAFETY: DSB has no effect beyond ordering memory accesses.
    unsafe {
        core::arch::asm!("dsb sy", options(nomem, nostack, preserves_flags));
    }
}

/// Instruction Synchronization Barrier
#[inline(always)]
fn isb() {
    #[cfg(target_arch = "arm")]
    // SAFETY: ISB only flushes the pipeline.
    unsafe {
        core::arch::asm!("isb", options(nomem, nostack, preserves_flags));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: FlashLayout = FlashLayout::STM32F103XE;

    #[test]
    fn test_plausible_table() {
        let table = VectorTable {
            initial_sp: 0x2001_0000,
            reset_vector: 0x0800_4101,
        };
        assert!(table.validate(&LAYOUT).is_ok());
    }

    #[test]
    fn test_rejects_arm_mode_and_bad_stack() {
        let arm_mode = VectorTable {
            initial_sp: 0x2001_0000,
            reset_vector: 0x0800_4100,
        };
        assert_eq!(arm_mode.validate(&LAYOUT), Err(Error::InvalidVectorTable));

        let erased = VectorTable {
            initial_sp: 0xFFFF_FFFF,
            reset_vector: 0xFFFF_FFFF,
        };
        assert_eq!(erased.validate(&LAYOUT), Err(Error::InvalidVectorTable));
    }

    #[test]
    fn test_rejects_entry_in_bootloader() {
        let table = VectorTable {
            initial_sp: 0x2000_8000,
            reset_vector: 0x0800_0101,
        };
        assert_eq!(table.validate(&LAYOUT), Err(Error::InvalidVectorTable));
    }
}
