// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32F1 USART driver
//!
//! Polled USART1 on PA9 (TX) / PA10 (RX), 8N1. Framing of bootloader
//! commands on top of the byte stream lives in [`crate::framing`].

use crate::error::{HalError, HalResult};
use crate::stm32f1::gpio::{GpioPort, PinMode, Stm32f1GpioPin};
use crate::stm32f1::{enable_clock, Bus};
use crate::traits::UartInterface;
use core::ptr;

// ============================================================================
// USART Register Definitions (STM32F1 RM0008)
// ============================================================================

/// USART1 register base
const USART1_BASE: u32 = 0x4001_3800;

const USART_SR_OFFSET: u32 = 0x00; // Status register
const USART_DR_OFFSET: u32 = 0x04; // Data register
const USART_BRR_OFFSET: u32 = 0x08; // Baud rate register
const USART_CR1_OFFSET: u32 = 0x0C; // Control register 1

// SR bits
const SR_FE: u32 = 1 << 1; // Framing error
const SR_NE: u32 = 1 << 2; // Noise error
const SR_ORE: u32 = 1 << 3; // Overrun error
const SR_RXNE: u32 = 1 << 5; // Read data register not empty
const SR_TC: u32 = 1 << 6; // Transmission complete
const SR_TXE: u32 = 1 << 7; // Transmit data register empty

// CR1 bits
const CR1_RE: u32 = 1 << 2;
const CR1_TE: u32 = 1 << 3;
const CR1_UE: u32 = 1 << 13;

/// RCC_APB2ENR USART1EN
const RCC_USART1EN_BIT: u32 = 14;

/// Timeout for blocking operations (loop iterations)
const BLOCKING_TIMEOUT: u32 = 1_000_000;

/// Compute BRR for 16x oversampling, rounded to nearest
#[must_use]
pub const fn brr_for(pclk_hz: u32, baud_rate: u32) -> Option<u32> {
    if baud_rate == 0 {
        return None;
    }
    let brr = (pclk_hz + baud_rate / 2) / baud_rate;
    if brr < 16 || brr > 0xFFFF {
        None
    } else {
        Some(brr)
    }
}

// ============================================================================
// USART Driver
// ============================================================================

/// STM32F1 USART1 driver
pub struct Stm32f1Usart {
    /// APB2 clock feeding USART1
    pclk_hz: u32,
    /// Whether the USART is initialized
    initialized: bool,
    /// Overrun or framing errors seen and cleared
    line_errors: u32,
}

impl Stm32f1Usart {
    /// Create a new driver instance
    #[must_use]
    pub const fn new(pclk_hz: u32) -> Self {
        Self {
            pclk_hz,
            initialized: false,
            line_errors: 0,
        }
    }

    /// Number of line errors cleared so far
    #[must_use]
    pub const fn line_errors(&self) -> u32 {
        self.line_errors
    }

    #[inline]
    fn reg(offset: u32) -> u32 {
        USART1_BASE + offset
    }

    /// Read the status register
    fn read_sr() -> u32 {
        // SAFETY: USART_SR is a readable status register
        unsafe { ptr::read_volatile(Self::reg(USART_SR_OFFSET) as *const u32) }
    }

    fn read_dr() -> u32 {
        // SAFETY: reading DR pops the receive register; after an SR read
        // this also clears ORE/FE/NE
        unsafe { ptr::read_volatile(Self::reg(USART_DR_OFFSET) as *const u32) }
    }
}

impl UartInterface for Stm32f1Usart {
    fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        let brr = brr_for(self.pclk_hz, baud_rate).ok_or(HalError::InvalidParameter)?;

        let mut tx = Stm32f1GpioPin::new(GpioPort::PortA, 9);
        let mut rx = Stm32f1GpioPin::new(GpioPort::PortA, 10);
        tx.configure(PinMode::AlternatePushPull);
        rx.configure(PinMode::InputFloating);

        enable_clock(Bus::Apb2, RCC_USART1EN_BIT);

        // SAFETY: USART1 MMIO registers. UE is cleared while BRR is written
        // and set last so no partial configuration is ever active.
        unsafe {
            ptr::write_volatile(Self::reg(USART_CR1_OFFSET) as *mut u32, 0);
            ptr::write_volatile(Self::reg(USART_BRR_OFFSET) as *mut u32, brr);
            ptr::write_volatile(
                Self::reg(USART_CR1_OFFSET) as *mut u32,
                CR1_UE | CR1_TE | CR1_RE,
            );
        }

        self.initialized = true;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }

        let mut timeout = BLOCKING_TIMEOUT;
        while Self::read_sr() & SR_TXE == 0 {
            timeout = timeout.saturating_sub(1);
            if timeout == 0 {
                return Err(HalError::Timeout);
            }
            core::hint::spin_loop();
        }

        // SAFETY: TXE was observed, DR accepts the next byte
        unsafe {
            ptr::write_volatile(Self::reg(USART_DR_OFFSET) as *mut u32, u32::from(byte));
        }
        Ok(())
    }

    fn try_read_byte(&mut self) -> HalResult<Option<u8>> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }

        let sr = Self::read_sr();
        if sr & (SR_ORE | SR_FE | SR_NE) != 0 {
            // SR then DR read sequence clears the error flags
            let _ = Self::read_dr();
            self.line_errors = self.line_errors.saturating_add(1);
            return Err(HalError::UartOverrun);
        }
        if sr & SR_RXNE == 0 {
            return Ok(None);
        }

        Ok(Some((Self::read_dr() & 0xFF) as u8))
    }

    fn flush(&mut self) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }

        let mut timeout = BLOCKING_TIMEOUT;
        while Self::read_sr() & SR_TC == 0 {
            timeout = timeout.saturating_sub(1);
            if timeout == 0 {
                return Err(HalError::Timeout);
            }
            core::hint::spin_loop();
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brr_rounding() {
        // 8 MHz / 115200 = 69.44
        assert_eq!(brr_for(8_000_000, 115_200), Some(69));
        assert_eq!(brr_for(72_000_000, 115_200), Some(625));
        assert_eq!(brr_for(8_000_000, 0), None);
        assert_eq!(brr_for(8_000_000, 1_000_000), None);
    }

    #[test]
    fn test_uart_not_initialized() {
        let mut uart = Stm32f1Usart::new(8_000_000);
        assert_eq!(uart.write_byte(0x55), Err(HalError::NotInitialized));
        assert_eq!(uart.try_read_byte(), Err(HalError::NotInitialized));
        assert_eq!(uart.flush(), Err(HalError::NotInitialized));
        assert_eq!(uart.line_errors(), 0);
    }
}
