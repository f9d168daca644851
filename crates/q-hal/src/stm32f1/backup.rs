// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Backup-domain update mailbox
//!
//! The running application asks for an update by writing
//! [`UPDATE_REQUEST_MAGIC`] to backup data register DR1 and resetting. The
//! register survives a system reset (not a power cycle), so the bootloader
//! reads and clears it once at startup.

use crate::stm32f1::{enable_clock, Bus};
use core::ptr;
use q_common::constants::UPDATE_REQUEST_MAGIC;

/// PWR control register
const PWR_CR: u32 = 0x4000_7000;
/// Disable backup domain write protection
const PWR_CR_DBP: u32 = 1 << 8;

/// BKP data register 1
const BKP_DR1: u32 = 0x4000_6C04;

// RCC_APB1ENR bits
const RCC_BKPEN_BIT: u32 = 27;
const RCC_PWREN_BIT: u32 = 28;

/// Whether a raw DR1 value is an update request
#[must_use]
pub const fn is_update_request(value: u16) -> bool {
    value == UPDATE_REQUEST_MAGIC
}

/// Handle to the update request register
pub struct BackupMailbox {
    _private: (),
}

impl BackupMailbox {
    /// Enable the backup domain and open it for writing
    #[must_use]
    pub fn open() -> Self {
        enable_clock(Bus::Apb1, RCC_PWREN_BIT);
        enable_clock(Bus::Apb1, RCC_BKPEN_BIT);

        // SAFETY: PWR_CR is an STM32F1 MMIO register; setting DBP only lifts
        // write protection on the backup registers.
        unsafe {
            let cr = ptr::read_volatile(PWR_CR as *const u32);
            ptr::write_volatile(PWR_CR as *mut u32, cr | PWR_CR_DBP);
        }

        Self { _private: () }
    }

    /// Read and clear a pending request
    pub fn take_update_request(&mut self) -> bool {
        // SAFETY: BKP_DR1 is a 16-bit data register in the backup domain,
        // writable after `open`.
        let value = unsafe { ptr::read_volatile(BKP_DR1 as *const u32) } as u16;
        if !is_update_request(value) {
            return false;
        }
        // SAFETY: see above
        unsafe { ptr::write_volatile(BKP_DR1 as *mut u32, 0) };
        true
    }

    /// Leave a request for the next boot
    pub fn request_update(&mut self) {
        // SAFETY: see `take_update_request`
        unsafe { ptr::write_volatile(BKP_DR1 as *mut u32, u32::from(UPDATE_REQUEST_MAGIC)) };
    }
}
