// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL trait definitions
//!
//! Platform-agnostic interfaces the bootloader is written against. Each
//! board provides one implementation of every trait; the simulation backend
//! in [`crate::sim`] provides host-side ones.

use crate::error::{HalError, HalResult};
use q_common::constants::FLASH_ERASED_BYTE;
use q_common::time::{TickFrequency, Ticks};

/// Flash memory interface
///
/// Mirrors a controller that programs in half-words and erases whole pages,
/// with explicit program and erase modes. Use [`ProgramBracket`] and
/// [`EraseBracket`] rather than calling the `begin_*`/`end_*` pairs
/// directly.
pub trait FlashInterface {
    /// Flash page size in bytes (erase granularity)
    const PAGE_SIZE: usize;

    /// Total flash size in bytes
    const TOTAL_SIZE: usize;

    /// Base address of flash
    const BASE_ADDRESS: u32;

    /// Initialize flash controller
    fn init(&mut self) -> HalResult<()>;

    /// Read data from flash
    ///
    /// # Arguments
    /// * `address` - Absolute flash address
    /// * `buffer` - Buffer to read into
    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()>;

    /// Read one little-endian word
    fn read_u32(&self, address: u32) -> HalResult<u32> {
        let mut word = [0u8; 4];
        self.read(address, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Enter programming mode
    fn begin_programming(&mut self) -> HalResult<()>;

    /// Wait for the controller to go idle and leave programming mode
    fn end_programming(&mut self) -> HalResult<()>;

    /// Enter page-erase mode
    fn begin_erasing(&mut self) -> HalResult<()>;

    /// Wait for the controller to go idle and leave page-erase mode
    fn end_erasing(&mut self) -> HalResult<()>;

    /// Program one half-word
    ///
    /// Blocks until any previous operation completes. Only valid in
    /// programming mode; `address` must be half-word aligned and the target
    /// must be erased.
    fn program_half_word(&mut self, address: u32, value: u16) -> HalResult<()>;

    /// Erase the page containing `address`
    ///
    /// Only valid in erase mode. Blocks to completion.
    fn erase_page(&mut self, address: u32) -> HalResult<()>;

    /// Erase every page in `[start, end)` inside one erase bracket
    ///
    /// Stops at the first failing page.
    fn erase_range(&mut self, start: u32, end: u32) -> HalResult<()>
    where
        Self: Sized,
    {
        self.erase_range_each(start, end, |_| {})
    }

    /// [`erase_range`](Self::erase_range), calling `after_page` with the
    /// address of each page once it is erased
    ///
    /// A page erase blocks for tens of milliseconds; the hook is where a
    /// long erase keeps a watchdog fed.
    fn erase_range_each<H>(&mut self, start: u32, end: u32, mut after_page: H) -> HalResult<()>
    where
        Self: Sized,
        H: FnMut(u32),
    {
        let mut bracket = EraseBracket::open(self)?;
        let mut addr = start;
        while addr < end {
            bracket.erase_page(addr)?;
            after_page(addr);
            addr = addr.checked_add(Self::PAGE_SIZE as u32).ok_or(HalError::FlashOutOfBounds)?;
        }
        bracket.finish()
    }

    /// Lock flash (prevent writes)
    fn lock(&mut self) -> HalResult<()>;

    /// Unlock flash (allow writes)
    fn unlock(&mut self) -> HalResult<()>;

    /// Check if flash is locked
    fn is_locked(&self) -> bool;
}

// =============================================================================
// Scoped Flash Mode Brackets
// =============================================================================

/// Programming mode held for the lifetime of the bracket
///
/// Dropping the bracket leaves programming mode; call [`finish`] to observe
/// the final busy-wait result.
///
/// [`finish`]: ProgramBracket::finish
pub struct ProgramBracket<'a, F: FlashInterface> {
    flash: &'a mut F,
    open: bool,
}

impl<'a, F: FlashInterface> ProgramBracket<'a, F> {
    /// Enter programming mode
    pub fn open(flash: &'a mut F) -> HalResult<Self> {
        flash.begin_programming()?;
        Ok(Self { flash, open: true })
    }

    /// Program one half-word
    pub fn program_half_word(&mut self, address: u32, value: u16) -> HalResult<()> {
        self.flash.program_half_word(address, value)
    }

    /// Program a byte run as little-endian half-words
    ///
    /// An odd trailing byte is paired with `0xFF`, which leaves the
    /// neighbouring erased byte untouched.
    pub fn program(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        if address % 2 != 0 {
            return Err(HalError::FlashMisaligned);
        }

        let mut cursor = address;
        for pair in data.chunks(2) {
            let high = pair.get(1).copied().unwrap_or(FLASH_ERASED_BYTE);
            self.flash
                .program_half_word(cursor, u16::from_le_bytes([pair[0], high]))?;
            cursor = cursor.wrapping_add(2);
        }
        Ok(())
    }

    /// Read back through the bracket without leaving programming mode
    pub fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        self.flash.read(address, buffer)
    }

    /// Leave programming mode, reporting the final wait
    pub fn finish(mut self) -> HalResult<()> {
        self.open = false;
        self.flash.end_programming()
    }
}

impl<F: FlashInterface> Drop for ProgramBracket<'_, F> {
    fn drop(&mut self) {
        if self.open {
            // Nothing left to report to on an early exit
            let _ = self.flash.end_programming();
        }
    }
}

/// Page-erase mode held for the lifetime of the bracket
pub struct EraseBracket<'a, F: FlashInterface> {
    flash: &'a mut F,
    open: bool,
}

impl<'a, F: FlashInterface> EraseBracket<'a, F> {
    /// Enter page-erase mode
    pub fn open(flash: &'a mut F) -> HalResult<Self> {
        flash.begin_erasing()?;
        Ok(Self { flash, open: true })
    }

    /// Erase the page containing `address`
    pub fn erase_page(&mut self, address: u32) -> HalResult<()> {
        self.flash.erase_page(address)
    }

    /// Leave erase mode, reporting the final wait
    pub fn finish(mut self) -> HalResult<()> {
        self.open = false;
        self.flash.end_erasing()
    }
}

impl<F: FlashInterface> Drop for EraseBracket<'_, F> {
    fn drop(&mut self) {
        if self.open {
            let _ = self.flash.end_erasing();
        }
    }
}

// =============================================================================
// Collaborators
// =============================================================================

/// Byte-stream transport carrying one command per frame
pub trait Transport {
    /// Bring up the transport
    fn init(&mut self) -> HalResult<()>;

    /// Copy the next complete frame into `buffer`
    ///
    /// Returns `None` when no frame is pending. Frames longer than `buffer`
    /// are discarded by the implementation.
    fn receive(&mut self, buffer: &mut [u8]) -> Option<usize>;

    /// Send one reply frame
    fn write(&mut self, data: &[u8]) -> HalResult<()>;
}

/// Cooperative scheduler pumped by the update loop
pub trait Scheduler {
    /// One-time initialisation
    fn init(&mut self) -> HalResult<()>;

    /// Run one round of pending background work
    fn work(&mut self);
}

/// Monotonic clock
pub trait Clock {
    /// Tick rate in Hz
    const FREQUENCY_HZ: u32;

    /// Initialize the clock
    fn init(&mut self) -> HalResult<()>;

    /// Current tick count
    fn ticks(&self) -> u64;

    /// Current tick count as a stamp
    fn now(&self) -> Ticks {
        Ticks::new(self.ticks())
    }

    /// Frequency as a converter
    fn frequency(&self) -> TickFrequency {
        TickFrequency::from_hz(Self::FREQUENCY_HZ)
    }

    /// Elapsed milliseconds since boot
    fn millis(&self) -> u64 {
        self.frequency().ticks_to_millis(self.ticks())
    }
}

/// Button, power sense and status indicator
pub trait UserInterface {
    /// Update button currently held
    fn is_button_pressed(&self) -> bool;

    /// Running from external (USB or charger) power
    fn has_external_power(&self) -> bool;

    /// Drive the status indicator
    fn set_indicator(&mut self, on: bool);
}

/// Hand control to a program at a vector table address
pub trait Jumper {
    /// Jump execution to the image whose vector table starts at `address`,
    /// as though the chip had started executing there.
    fn jump(&self, address: u32) -> !;
}

/// GPIO interface
pub trait GpioPin {
    /// Set pin high
    fn set_high(&mut self) -> HalResult<()>;

    /// Set pin low
    fn set_low(&mut self) -> HalResult<()>;

    /// Read pin state
    fn is_high(&self) -> HalResult<bool>;
}

/// UART serial interface
pub trait UartInterface {
    /// Initialize the UART with the given baud rate
    fn init(&mut self, baud_rate: u32) -> HalResult<()>;

    /// Write a byte (blocking)
    fn write_byte(&mut self, byte: u8) -> HalResult<()>;

    /// Read a byte if one is waiting
    fn try_read_byte(&mut self) -> HalResult<Option<u8>>;

    /// Write a buffer of bytes (blocking)
    fn write(&mut self, data: &[u8]) -> HalResult<()> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Block until the transmitter is empty
    fn flush(&mut self) -> HalResult<()>;
}

/// Watchdog interface
pub trait WatchdogInterface {
    /// Initialize and start watchdog
    fn init(&mut self, timeout_ms: u32) -> HalResult<()>;

    /// Feed/refresh the watchdog
    fn feed(&mut self) -> HalResult<()>;
}
