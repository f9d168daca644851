// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32F1 Flash Driver
//!
//! Flash driver for the high-density STM32F103 (RM0008, section 3.3 and
//! the PM0075 programming manual).
//!
//! # STM32F1 Flash Characteristics
//!
//! - Total: 512KB single bank
//! - Page size: 2KB
//! - Write: 16-bit half-word, target must be erased (or written with 0)
//! - Program and erase are selected by the PG and PER bits in `FLASH_CR`;
//!   the driver keeps exactly one of them set between `begin_*` and `end_*`
//!
//! # Safety
//!
//! Flash operations modify volatile memory-mapped registers. Each operation
//! waits for `BSY` to clear before returning.

use crate::error::{HalError, HalResult};
use crate::traits::FlashInterface;
use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{compiler_fence, Ordering};

// =============================================================================
// Flash Memory Map
// =============================================================================

/// Flash base address
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Flash page size (2KB)
pub const FLASH_PAGE_SIZE: usize = 2 * 1024;

/// Total flash size (512KB)
pub const FLASH_TOTAL_SIZE: usize = 512 * 1024;

// =============================================================================
// Flash Register Definitions (STM32F1 RM0008)
// =============================================================================

/// Flash interface register base
const FLASH_R_BASE: u32 = 0x4002_2000;

const FLASH_KEYR_OFFSET: u32 = 0x04; // Key register
const FLASH_SR_OFFSET: u32 = 0x0C; // Status register
const FLASH_CR_OFFSET: u32 = 0x10; // Control register
const FLASH_AR_OFFSET: u32 = 0x14; // Address register

// Flash unlock keys
const FLASH_KEY1: u32 = 0x4567_0123;
const FLASH_KEY2: u32 = 0xCDEF_89AB;

// Control register bits
const FLASH_CR_PG: u32 = 1 << 0; // Programming
const FLASH_CR_PER: u32 = 1 << 1; // Page erase
const FLASH_CR_STRT: u32 = 1 << 6; // Start erase
const FLASH_CR_LOCK: u32 = 1 << 7; // Lock

// Status register bits
const FLASH_SR_BSY: u32 = 1 << 0; // Busy
const FLASH_SR_PGERR: u32 = 1 << 2; // Programming error
const FLASH_SR_WRPRTERR: u32 = 1 << 4; // Write protection error
const FLASH_SR_EOP: u32 = 1 << 5; // End of operation

/// All error flags mask
const FLASH_SR_ERRORS: u32 = FLASH_SR_PGERR | FLASH_SR_WRPRTERR;

// =============================================================================
// Register Access
// =============================================================================

/// Flash register accessors
struct FlashRegs;

impl FlashRegs {
    #[inline]
    unsafe fn read(offset: u32) -> u32 {
        read_volatile((FLASH_R_BASE + offset) as *const u32)
    }

    #[inline]
    unsafe fn write(offset: u32, value: u32) {
        write_volatile((FLASH_R_BASE + offset) as *mut u32, value);
    }

    #[inline]
    unsafe fn modify<F: FnOnce(u32) -> u32>(offset: u32, f: F) {
        let val = Self::read(offset);
        Self::write(offset, f(val));
    }

    unsafe fn cr() -> u32 { Self::read(FLASH_CR_OFFSET) }
    unsafe fn sr() -> u32 { Self::read(FLASH_SR_OFFSET) }
    // SR flags are write-1-to-clear
    unsafe fn clear_sr(val: u32) { Self::write(FLASH_SR_OFFSET, val); }
    unsafe fn set_keyr(val: u32) { Self::write(FLASH_KEYR_OFFSET, val); }
    unsafe fn set_ar(val: u32) { Self::write(FLASH_AR_OFFSET, val); }
}

// =============================================================================
// STM32F1 Flash Driver
// =============================================================================

/// Which mode bit the driver currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    /// Neither PG nor PER set
    Idle,
    /// PG set
    Programming,
    /// PER set
    Erasing,
}

/// STM32F1 Flash driver
pub struct Stm32f1Flash {
    /// Mode bracket currently open
    mode: FlashMode,
    /// Initialized state
    initialized: bool,
    /// Busy-wait budget in polling iterations (0 = no timeout)
    timeout_cycles: u32,
}

impl Stm32f1Flash {
    /// Default timeout, comfortably above the 40 ms worst-case page erase
    /// at 72 MHz
    pub const DEFAULT_TIMEOUT: u32 = 8_000_000;

    /// Create a new flash driver instance
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: FlashMode::Idle,
            initialized: false,
            timeout_cycles: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set operation timeout in polling iterations
    pub fn set_timeout(&mut self, cycles: u32) {
        self.timeout_cycles = cycles;
    }

    /// Current mode bracket
    #[must_use]
    pub const fn mode(&self) -> FlashMode {
        self.mode
    }

    /// Check if an address is within flash bounds
    #[must_use]
    pub const fn is_valid_address(address: u32) -> bool {
        address >= FLASH_BASE && address < FLASH_BASE + FLASH_TOTAL_SIZE as u32
    }

    /// Start address of the page containing `address`
    #[must_use]
    pub const fn page_address(address: u32) -> Option<u32> {
        if !Self::is_valid_address(address) {
            return None;
        }
        let offset = address - FLASH_BASE;
        Some(FLASH_BASE + offset - (offset % FLASH_PAGE_SIZE as u32))
    }

    fn check_ready(&self, wanted: FlashMode) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        if self.mode != wanted {
            return Err(HalError::FlashModeConflict);
        }
        Ok(())
    }

    /// Wait for flash operation to complete
    fn wait_for_operation(&self) -> HalResult<()> {
        let mut timeout = self.timeout_cycles;

        loop {
            // SAFETY: FLASH_SR is a read-only view of controller state.
            let sr = unsafe { FlashRegs::sr() };

            if sr & FLASH_SR_BSY == 0 {
                if sr & FLASH_SR_ERRORS != 0 {
                    // SAFETY: write-1-to-clear of the error flags just observed
                    unsafe { FlashRegs::clear_sr(FLASH_SR_ERRORS | FLASH_SR_EOP) };

                    if sr & FLASH_SR_WRPRTERR != 0 {
                        return Err(HalError::FlashWriteProtected);
                    }
                    return Err(HalError::FlashWriteFailed);
                }

                if sr & FLASH_SR_EOP != 0 {
                    // SAFETY: write-1-to-clear of EOP
                    unsafe { FlashRegs::clear_sr(FLASH_SR_EOP) };
                }
                return Ok(());
            }

            if timeout > 0 {
                timeout -= 1;
                if timeout == 0 {
                    return Err(HalError::FlashTimeout);
                }
            }

            core::hint::spin_loop();
        }
    }

    /// Clear all flash status flags
    fn clear_flags() {
        // SAFETY: write-1-to-clear of SR flags
        unsafe { FlashRegs::clear_sr(FLASH_SR_ERRORS | FLASH_SR_EOP) };
    }

    /// Check every byte of a page reads erased
    fn verify_erased(page: u32) -> bool {
        // SAFETY: `page` was validated by `page_address`; flash is
        // memory-mapped and always readable.
        unsafe {
            let ptr = page as *const u32;
            (0..FLASH_PAGE_SIZE / 4).all(|i| read_volatile(ptr.add(i)) == u32::MAX)
        }
    }
}

impl Default for Stm32f1Flash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashInterface for Stm32f1Flash {
    const PAGE_SIZE: usize = FLASH_PAGE_SIZE;
    const TOTAL_SIZE: usize = FLASH_TOTAL_SIZE;
    const BASE_ADDRESS: u32 = FLASH_BASE;

    fn init(&mut self) -> HalResult<()> {
        if self.initialized {
            return Ok(());
        }

        Self::clear_flags();
        // A previous run may have been reset mid-bracket
        // SAFETY: clearing PG and PER with no operation in flight
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr & !(FLASH_CR_PG | FLASH_CR_PER)) };

        self.mode = FlashMode::Idle;
        self.initialized = true;
        Ok(())
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        if !Self::is_valid_address(address) {
            return Err(HalError::FlashOutOfBounds);
        }

        let end_address = address.saturating_add(buffer.len() as u32);
        if end_address > FLASH_BASE + FLASH_TOTAL_SIZE as u32 {
            return Err(HalError::FlashOutOfBounds);
        }

        // SAFETY: Reading from flash memory-mapped region, bounds checked above
        unsafe {
            let src = address as *const u8;
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = read_volatile(src.add(i));
            }
        }

        Ok(())
    }

    fn begin_programming(&mut self) -> HalResult<()> {
        self.check_ready(FlashMode::Idle)?;
        if self.is_locked() {
            return Err(HalError::FlashLocked);
        }

        self.wait_for_operation()?;
        Self::clear_flags();
        // SAFETY: controller idle and unlocked; PG selects half-word programming
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr | FLASH_CR_PG) };

        self.mode = FlashMode::Programming;
        Ok(())
    }

    fn end_programming(&mut self) -> HalResult<()> {
        if self.mode != FlashMode::Programming {
            return Ok(());
        }

        let result = self.wait_for_operation();
        // SAFETY: clear PG once the last write has drained
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr & !FLASH_CR_PG) };
        self.mode = FlashMode::Idle;
        result
    }

    fn begin_erasing(&mut self) -> HalResult<()> {
        self.check_ready(FlashMode::Idle)?;
        if self.is_locked() {
            return Err(HalError::FlashLocked);
        }

        self.wait_for_operation()?;
        Self::clear_flags();
        // SAFETY: controller idle and unlocked; PER selects page erase
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr | FLASH_CR_PER) };

        self.mode = FlashMode::Erasing;
        Ok(())
    }

    fn end_erasing(&mut self) -> HalResult<()> {
        if self.mode != FlashMode::Erasing {
            return Ok(());
        }

        let result = self.wait_for_operation();
        // SAFETY: clear PER once the last erase has drained
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr & !FLASH_CR_PER) };
        self.mode = FlashMode::Idle;
        result
    }

    fn program_half_word(&mut self, address: u32, value: u16) -> HalResult<()> {
        self.check_ready(FlashMode::Programming)?;
        if !Self::is_valid_address(address) || !Self::is_valid_address(address + 1) {
            return Err(HalError::FlashOutOfBounds);
        }
        if address % 2 != 0 {
            return Err(HalError::FlashMisaligned);
        }

        self.wait_for_operation()?;

        // SAFETY: PG is set and the address is an aligned half-word inside
        // flash; a 16-bit store is the programming operation itself.
        unsafe {
            compiler_fence(Ordering::SeqCst);
            write_volatile(address as *mut u16, value);
            compiler_fence(Ordering::SeqCst);
        }

        self.wait_for_operation()?;

        // SAFETY: reading back the half-word just programmed
        let readback = unsafe { read_volatile(address as *const u16) };
        if readback != value {
            return Err(HalError::FlashWriteFailed);
        }

        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> HalResult<()> {
        self.check_ready(FlashMode::Erasing)?;
        let page = Self::page_address(address).ok_or(HalError::FlashOutOfBounds)?;

        self.wait_for_operation()?;

        // SAFETY: PER is set; AR selects the page and STRT launches the erase
        unsafe {
            FlashRegs::set_ar(page);
            FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr | FLASH_CR_STRT);
        }

        self.wait_for_operation().map_err(|e| match e {
            HalError::FlashWriteFailed => HalError::FlashEraseFailed,
            other => other,
        })?;

        if !Self::verify_erased(page) {
            return Err(HalError::FlashEraseFailed);
        }

        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }

        self.end_programming()?;
        self.end_erasing()?;

        // SAFETY: Setting lock bit; reversible only by the key sequence
        unsafe { FlashRegs::modify(FLASH_CR_OFFSET, |cr| cr | FLASH_CR_LOCK) };
        Ok(())
    }

    fn unlock(&mut self) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }

        if !self.is_locked() {
            return Ok(());
        }

        // SAFETY: Writing the unlock key sequence. A wrong sequence locks the
        // controller until reset, so the keys are written back to back.
        unsafe {
            FlashRegs::set_keyr(FLASH_KEY1);
            FlashRegs::set_keyr(FLASH_KEY2);
        }
        compiler_fence(Ordering::SeqCst);

        if self.is_locked() {
            return Err(HalError::FlashLocked);
        }
        Ok(())
    }

    fn is_locked(&self) -> bool {
        // SAFETY: Reading the control register
        unsafe { FlashRegs::cr() & FLASH_CR_LOCK != 0 }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_address() {
        assert_eq!(Stm32f1Flash::page_address(0x0800_0000), Some(0x0800_0000));
        assert_eq!(Stm32f1Flash::page_address(0x0800_47FF), Some(0x0800_4000));
        assert_eq!(Stm32f1Flash::page_address(0x0807_FFFF), Some(0x0807_F800));
        assert_eq!(Stm32f1Flash::page_address(0x0808_0000), None);
        assert_eq!(Stm32f1Flash::page_address(0x07FF_FFFE), None);
    }

    #[test]
    fn test_operations_need_init_and_bracket() {
        let mut flash = Stm32f1Flash::new();
        assert_eq!(flash.program_half_word(0x0800_4000, 0), Err(HalError::NotInitialized));
        assert_eq!(flash.erase_page(0x0800_4000), Err(HalError::NotInitialized));
        assert_eq!(flash.mode(), FlashMode::Idle);
    }

    #[test]
    fn test_end_without_begin_is_noop() {
        let mut flash = Stm32f1Flash::new();
        assert!(flash.end_programming().is_ok());
        assert!(flash.end_erasing().is_ok());
    }

    #[test]
    fn test_geometry() {
        assert_eq!(Stm32f1Flash::PAGE_SIZE, 2048);
        assert_eq!(Stm32f1Flash::TOTAL_SIZE % Stm32f1Flash::PAGE_SIZE, 0);
        assert!(!Stm32f1Flash::is_valid_address(FLASH_BASE + FLASH_TOTAL_SIZE as u32));
    }
}
