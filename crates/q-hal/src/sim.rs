// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Simulation backend
//!
//! Host-side stand-ins for the board peripherals. [`SimFlash`] follows the
//! STM32F1 controller rules closely enough that driver-level mistakes show
//! up in tests:
//!
//! - erased cells read `0xFF`
//! - programming outside programming mode, or while locked, is refused
//! - a half-word that is not erased can only be overwritten with `0x0000`
//! - erasing works on whole pages
//!
//! Faults can be injected per page or per address.

use core::cell::Cell;

use crate::error::{HalError, HalResult};
use crate::traits::{Clock, FlashInterface, GpioPin, UartInterface, WatchdogInterface};

// =============================================================================
// Flash
// =============================================================================

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFlashMode {
    /// Neither programming nor erasing
    Idle,
    /// PG set
    Programming,
    /// PER set
    Erasing,
}

/// RAM-backed flash
///
/// `BASE` is the absolute address of the first byte, `SIZE` the total size
/// and `PAGE` the erase granularity.
pub struct SimFlash<const BASE: u32, const SIZE: usize, const PAGE: usize> {
    data: [u8; SIZE],
    locked: bool,
    mode: SimFlashMode,
    fail_erase_at: Option<u32>,
    fail_program_at: Option<u32>,
    erase_count: u32,
    program_count: u32,
    read_count: Cell<u32>,
}

impl<const BASE: u32, const SIZE: usize, const PAGE: usize> SimFlash<BASE, SIZE, PAGE> {
    /// Fully erased, locked flash
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: [0xFF; SIZE],
            locked: true,
            mode: SimFlashMode::Idle,
            fail_erase_at: None,
            fail_program_at: None,
            erase_count: 0,
            program_count: 0,
            read_count: Cell::new(0),
        }
    }

    /// Make the erase of the page containing `address` fail
    pub fn fail_erase_at(&mut self, address: u32) {
        self.fail_erase_at = Some(Self::page_base(address));
    }

    /// Make programming of the half-word at `address` fail
    pub fn fail_program_at(&mut self, address: u32) {
        self.fail_program_at = Some(address & !1);
    }

    /// Remove injected faults
    pub fn clear_faults(&mut self) {
        self.fail_erase_at = None;
        self.fail_program_at = None;
    }

    /// Write raw bytes, bypassing controller rules (factory programming)
    ///
    /// # Errors
    ///
    /// Returns [`HalError::FlashOutOfBounds`] if the range leaves the device.
    pub fn preload(&mut self, address: u32, bytes: &[u8]) -> HalResult<()> {
        let range = self.range(address, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Direct view of a range
    ///
    /// # Errors
    ///
    /// Returns [`HalError::FlashOutOfBounds`] if the range leaves the device.
    pub fn slice(&self, address: u32, len: usize) -> HalResult<&[u8]> {
        let range = self.range(address, len)?;
        Ok(&self.data[range])
    }

    /// Number of pages erased so far
    #[must_use]
    pub const fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Number of half-words programmed so far
    #[must_use]
    pub const fn program_count(&self) -> u32 {
        self.program_count
    }

    /// Number of `read` calls so far
    #[must_use]
    pub fn read_count(&self) -> u32 {
        self.read_count.get()
    }

    /// Start counting reads from zero
    pub fn reset_read_count(&self) {
        self.read_count.set(0);
    }

    /// Current controller mode
    #[must_use]
    pub const fn mode(&self) -> SimFlashMode {
        self.mode
    }

    const fn page_base(address: u32) -> u32 {
        if PAGE == 0 {
            return address;
        }
        let offset = address.wrapping_sub(BASE);
        BASE.wrapping_add(offset - (offset % PAGE as u32))
    }

    fn range(&self, address: u32, len: usize) -> HalResult<core::ops::Range<usize>> {
        let offset = address.checked_sub(BASE).ok_or(HalError::FlashOutOfBounds)? as usize;
        let end = offset.checked_add(len).ok_or(HalError::FlashOutOfBounds)?;
        if end > SIZE {
            return Err(HalError::FlashOutOfBounds);
        }
        Ok(offset..end)
    }
}

impl<const BASE: u32, const SIZE: usize, const PAGE: usize> Default for SimFlash<BASE, SIZE, PAGE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BASE: u32, const SIZE: usize, const PAGE: usize> FlashInterface
    for SimFlash<BASE, SIZE, PAGE>
{
    const PAGE_SIZE: usize = PAGE;
    const TOTAL_SIZE: usize = SIZE;
    const BASE_ADDRESS: u32 = BASE;

    fn init(&mut self) -> HalResult<()> {
        if PAGE == 0 || SIZE % PAGE != 0 {
            return Err(HalError::InitFailed);
        }
        self.mode = SimFlashMode::Idle;
        Ok(())
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        self.read_count.set(self.read_count.get().wrapping_add(1));
        let range = self.range(address, buffer.len())?;
        buffer.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn begin_programming(&mut self) -> HalResult<()> {
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        if self.mode != SimFlashMode::Idle {
            return Err(HalError::FlashModeConflict);
        }
        self.mode = SimFlashMode::Programming;
        Ok(())
    }

    fn end_programming(&mut self) -> HalResult<()> {
        if self.mode == SimFlashMode::Programming {
            self.mode = SimFlashMode::Idle;
        }
        Ok(())
    }

    fn begin_erasing(&mut self) -> HalResult<()> {
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        if self.mode != SimFlashMode::Idle {
            return Err(HalError::FlashModeConflict);
        }
        self.mode = SimFlashMode::Erasing;
        Ok(())
    }

    fn end_erasing(&mut self) -> HalResult<()> {
        if self.mode == SimFlashMode::Erasing {
            self.mode = SimFlashMode::Idle;
        }
        Ok(())
    }

    fn program_half_word(&mut self, address: u32, value: u16) -> HalResult<()> {
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        if self.mode != SimFlashMode::Programming {
            return Err(HalError::FlashModeConflict);
        }
        if address % 2 != 0 {
            return Err(HalError::FlashMisaligned);
        }
        let range = self.range(address, 2)?;
        if self.fail_program_at == Some(address) {
            return Err(HalError::FlashWriteFailed);
        }

        let cell = &mut self.data[range];
        let current = u16::from_le_bytes([cell[0], cell[1]]);
        if current != 0xFFFF && value != 0 {
            return Err(HalError::FlashWriteFailed);
        }
        cell.copy_from_slice(&value.to_le_bytes());
        self.program_count = self.program_count.wrapping_add(1);
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> HalResult<()> {
        if self.locked {
            return Err(HalError::FlashLocked);
        }
        if self.mode != SimFlashMode::Erasing {
            return Err(HalError::FlashModeConflict);
        }
        self.range(address, 1)?;

        let page = Self::page_base(address);
        if self.fail_erase_at == Some(page) {
            return Err(HalError::FlashEraseFailed);
        }
        let range = self.range(page, PAGE)?;
        self.data[range].fill(0xFF);
        self.erase_count = self.erase_count.wrapping_add(1);
        Ok(())
    }

    fn lock(&mut self) -> HalResult<()> {
        self.locked = true;
        self.mode = SimFlashMode::Idle;
        Ok(())
    }

    fn unlock(&mut self) -> HalResult<()> {
        self.locked = false;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }
}

// =============================================================================
// GPIO
// =============================================================================

/// GPIO pin holding its level in memory
///
/// Uses interior mutability so a test can flip an input while the panel
/// owns a shared reference to it.
#[derive(Debug, Default)]
pub struct SimPin {
    level: Cell<bool>,
}

impl SimPin {
    /// Pin at the given level
    #[must_use]
    pub const fn new(high: bool) -> Self {
        Self {
            level: Cell::new(high),
        }
    }

    /// Force the level from outside
    pub fn set_level(&self, high: bool) {
        self.level.set(high);
    }

    /// Current level
    #[must_use]
    pub fn level(&self) -> bool {
        self.level.get()
    }
}

impl GpioPin for SimPin {
    fn set_high(&mut self) -> HalResult<()> {
        self.level.set(true);
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        self.level.set(false);
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        Ok(self.level.get())
    }
}

impl GpioPin for &SimPin {
    fn set_high(&mut self) -> HalResult<()> {
        self.level.set(true);
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        self.level.set(false);
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        Ok(self.level.get())
    }
}

// =============================================================================
// UART
// =============================================================================

/// Capacity of each [`SimUart`] direction
pub const SIM_UART_CAPACITY: usize = 1024;

/// Loopback-free UART with an injectable receive queue and a transmit log
pub struct SimUart {
    rx: [u8; SIM_UART_CAPACITY],
    rx_head: usize,
    rx_tail: usize,
    pending_error: bool,
    tx: [u8; SIM_UART_CAPACITY],
    tx_len: usize,
    baud_rate: Option<u32>,
}

impl SimUart {
    /// Empty, uninitialized UART
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rx: [0; SIM_UART_CAPACITY],
            rx_head: 0,
            rx_tail: 0,
            pending_error: false,
            tx: [0; SIM_UART_CAPACITY],
            tx_len: 0,
            baud_rate: None,
        }
    }

    /// Queue bytes for reception; excess beyond capacity is dropped
    pub fn inject(&mut self, bytes: &[u8]) {
        if self.rx_head == self.rx_tail {
            self.rx_head = 0;
            self.rx_tail = 0;
        }
        for &byte in bytes {
            if self.rx_tail == SIM_UART_CAPACITY {
                break;
            }
            self.rx[self.rx_tail] = byte;
            self.rx_tail += 1;
        }
    }

    /// Make the next read report an overrun
    pub fn inject_error(&mut self) {
        self.pending_error = true;
    }

    /// Everything written so far
    #[must_use]
    pub fn transmitted(&self) -> &[u8] {
        &self.tx[..self.tx_len]
    }

    /// Forget transmitted bytes
    pub fn clear_transmitted(&mut self) {
        self.tx_len = 0;
    }

    /// Baud rate passed to `init`
    #[must_use]
    pub const fn baud_rate(&self) -> Option<u32> {
        self.baud_rate
    }
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl UartInterface for SimUart {
    fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        if baud_rate == 0 {
            return Err(HalError::InvalidParameter);
        }
        self.baud_rate = Some(baud_rate);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> HalResult<()> {
        if self.baud_rate.is_none() {
            return Err(HalError::NotInitialized);
        }
        if self.tx_len == SIM_UART_CAPACITY {
            return Err(HalError::Busy);
        }
        self.tx[self.tx_len] = byte;
        self.tx_len += 1;
        Ok(())
    }

    fn try_read_byte(&mut self) -> HalResult<Option<u8>> {
        if self.baud_rate.is_none() {
            return Err(HalError::NotInitialized);
        }
        if self.pending_error {
            self.pending_error = false;
            return Err(HalError::UartOverrun);
        }
        if self.rx_head == self.rx_tail {
            return Ok(None);
        }
        let byte = self.rx[self.rx_head];
        self.rx_head += 1;
        Ok(Some(byte))
    }

    fn flush(&mut self) -> HalResult<()> {
        Ok(())
    }
}

// =============================================================================
// Watchdog
// =============================================================================

/// Watchdog that records what was done to it
#[derive(Debug, Default)]
pub struct SimWatchdog {
    armed: Option<u32>,
    feeds: u32,
}

impl SimWatchdog {
    /// Unarmed watchdog
    #[must_use]
    pub const fn new() -> Self {
        Self { armed: None, feeds: 0 }
    }

    /// Timeout passed to `init`, if armed
    #[must_use]
    pub const fn armed_timeout_ms(&self) -> Option<u32> {
        self.armed
    }

    /// Successful feeds
    #[must_use]
    pub const fn feeds(&self) -> u32 {
        self.feeds
    }
}

impl WatchdogInterface for SimWatchdog {
    fn init(&mut self, timeout_ms: u32) -> HalResult<()> {
        if timeout_ms == 0 {
            return Err(HalError::InvalidParameter);
        }
        self.armed = Some(timeout_ms);
        Ok(())
    }

    fn feed(&mut self) -> HalResult<()> {
        if self.armed.is_none() {
            return Err(HalError::NotInitialized);
        }
        self.feeds = self.feeds.wrapping_add(1);
        Ok(())
    }
}

// =============================================================================
// Clock
// =============================================================================

/// 1 kHz clock that advances by a fixed step on every read
///
/// A step of zero gives a frozen clock that only moves via [`advance`].
///
/// [`advance`]: SimClock::advance
#[derive(Debug)]
pub struct SimClock {
    now: Cell<u64>,
    step: u64,
}

impl SimClock {
    /// Clock starting at `start` ms, advancing `step` ms per read
    #[must_use]
    pub const fn new(start: u64, step: u64) -> Self {
        Self {
            now: Cell::new(start),
            step,
        }
    }

    /// Move time forward
    pub fn advance(&self, millis: u64) {
        self.now.set(self.now.get().saturating_add(millis));
    }
}

impl Clock for SimClock {
    const FREQUENCY_HZ: u32 = 1_000;

    fn init(&mut self) -> HalResult<()> {
        Ok(())
    }

    fn ticks(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now.saturating_add(self.step));
        now
    }
}

impl Clock for &SimClock {
    const FREQUENCY_HZ: u32 = 1_000;

    fn init(&mut self) -> HalResult<()> {
        Ok(())
    }

    fn ticks(&self) -> u64 {
        SimClock::ticks(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{EraseBracket, ProgramBracket};

    type Flash = SimFlash<0x0800_0000, 4096, 1024>;

    fn unlocked() -> Flash {
        let mut flash = Flash::new();
        flash.init().unwrap();
        flash.unlock().unwrap();
        flash
    }

    #[test]
    fn test_program_requires_bracket() {
        let mut flash = unlocked();
        assert_eq!(
            flash.program_half_word(0x0800_0000, 0x1234),
            Err(HalError::FlashModeConflict)
        );

        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        bracket.program_half_word(0x0800_0000, 0x1234).unwrap();
        bracket.finish().unwrap();

        assert_eq!(flash.slice(0x0800_0000, 2).unwrap(), &[0x34, 0x12]);
        assert_eq!(flash.mode(), SimFlashMode::Idle);
    }

    #[test]
    fn test_locked_flash_refuses_brackets() {
        let mut flash = Flash::new();
        assert!(ProgramBracket::open(&mut flash).is_err());
        assert!(EraseBracket::open(&mut flash).is_err());
    }

    #[test]
    fn test_dropped_bracket_leaves_mode() {
        let mut flash = unlocked();
        {
            let _bracket = EraseBracket::open(&mut flash).unwrap();
        }
        assert_eq!(flash.mode(), SimFlashMode::Idle);
    }

    #[test]
    fn test_overwrite_needs_erase() {
        let mut flash = unlocked();
        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        bracket.program_half_word(0x0800_0010, 0xABCD).unwrap();
        assert_eq!(
            bracket.program_half_word(0x0800_0010, 0x1111),
            Err(HalError::FlashWriteFailed)
        );
        // Zeroing a programmed cell is always allowed
        bracket.program_half_word(0x0800_0010, 0).unwrap();
    }

    #[test]
    fn test_erase_page_resets_whole_page() {
        let mut flash = unlocked();
        flash.preload(0x0800_0400, &[0u8; 1024]).unwrap();
        flash.preload(0x0800_0800, &[0u8; 4]).unwrap();

        flash.erase_range(0x0800_0400, 0x0800_0800).unwrap();

        assert!(flash.slice(0x0800_0400, 1024).unwrap().iter().all(|&b| b == 0xFF));
        assert_eq!(flash.slice(0x0800_0800, 4).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn test_injected_erase_fault() {
        let mut flash = unlocked();
        flash.fail_erase_at(0x0800_0C10);
        assert_eq!(
            flash.erase_range(0x0800_0000, 0x0800_1000),
            Err(HalError::FlashEraseFailed)
        );
        assert_eq!(flash.erase_count(), 3);
        assert_eq!(flash.mode(), SimFlashMode::Idle);
    }

    #[test]
    fn test_odd_tail_padded() {
        let mut flash = unlocked();
        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        bracket.program(0x0800_0020, &[1, 2, 3]).unwrap();
        drop(bracket);
        assert_eq!(flash.slice(0x0800_0020, 4).unwrap(), &[1, 2, 3, 0xFF]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut flash = unlocked();
        let mut buf = [0u8; 4];
        assert_eq!(flash.read(0x0800_0FFE, &mut buf), Err(HalError::FlashOutOfBounds));
        assert_eq!(flash.read(0x07FF_FFFF, &mut buf[..1]), Err(HalError::FlashOutOfBounds));
        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        assert_eq!(
            bracket.program_half_word(0x0800_1000, 0),
            Err(HalError::FlashOutOfBounds)
        );
    }

    #[test]
    fn test_clock_steps_per_read() {
        let clock = SimClock::new(10, 5);
        assert_eq!(clock.ticks(), 10);
        assert_eq!(clock.ticks(), 15);
        clock.advance(100);
        assert_eq!(clock.millis(), 120);
    }
}
