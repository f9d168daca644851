// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! STM32F1 GPIO Driver
//!
//! The F1 family configures each pin with a 4-bit field (`CNF[1:0]`,
//! `MODE[1:0]`) in `CRL` (pins 0-7) or `CRH` (pins 8-15). Input pull
//! direction is selected through `ODR`.
//!
//! # Usage
//!
//! ```no_run
//! use q_hal::stm32f1::gpio::*;
//!
//! let mut led = Stm32f1GpioPin::new(GpioPort::PortC, 13);
//! led.configure(PinMode::OutputPushPull);
//! ```

use crate::error::{HalError, HalResult};
use crate::stm32f1::{enable_clock, Bus};
use crate::traits::GpioPin;
use core::ptr;

// ============================================================================
// STM32F1 GPIO Register Offsets
// ============================================================================

/// Configuration register low (pins 0-7)
const GPIO_CRL_OFFSET: u32 = 0x00;
/// Configuration register high (pins 8-15)
const GPIO_CRH_OFFSET: u32 = 0x04;
/// Input data register
const GPIO_IDR_OFFSET: u32 = 0x08;
/// Output data register
const GPIO_ODR_OFFSET: u32 = 0x0C;
/// Bit set/reset register (atomic set/reset)
const GPIO_BSRR_OFFSET: u32 = 0x10;

/// GPIO port identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GpioPort {
    /// GPIOA
    PortA = 0,
    /// GPIOB
    PortB = 1,
    /// GPIOC
    PortC = 2,
    /// GPIOD
    PortD = 3,
    /// GPIOE
    PortE = 4,
}

impl GpioPort {
    /// Get the base address for this GPIO port
    const fn base_addr(self) -> u32 {
        // GPIOA base = 0x4001_0800, each port is 0x400 apart
        0x4001_0800 + (self as u32) * 0x400
    }

    /// RCC_APB2ENR bit (IOPAEN is bit 2)
    const fn rcc_enable_bit(self) -> u32 {
        2 + self as u32
    }
}

/// Pin configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Floating input (reset state)
    InputFloating,
    /// Input with pull-up
    InputPullUp,
    /// Input with pull-down
    InputPullDown,
    /// General purpose push-pull output, 2 MHz
    OutputPushPull,
    /// Alternate function push-pull output, 50 MHz (USART TX)
    AlternatePushPull,
}

impl PinMode {
    /// `CNF[1:0]:MODE[1:0]` nibble
    #[must_use]
    pub const fn config_bits(self) -> u32 {
        match self {
            Self::InputFloating => 0b0100,
            Self::InputPullUp | Self::InputPullDown => 0b1000,
            Self::OutputPushPull => 0b0010,
            Self::AlternatePushPull => 0b1011,
        }
    }
}

/// Register offset and bit shift of a pin's configuration nibble
#[must_use]
pub const fn config_field(pin: u8) -> (u32, u32) {
    if pin < 8 {
        (GPIO_CRL_OFFSET, (pin as u32) * 4)
    } else {
        (GPIO_CRH_OFFSET, ((pin - 8) as u32) * 4)
    }
}

// ============================================================================
// GPIO Pin Driver
// ============================================================================

/// STM32F1 GPIO pin driver
pub struct Stm32f1GpioPin {
    port: GpioPort,
    pin: u8,
    configured: bool,
}

impl Stm32f1GpioPin {
    /// Create a new GPIO pin handle (unconfigured)
    ///
    /// # Panics
    /// Panics if `pin > 15`.
    #[must_use]
    pub const fn new(port: GpioPort, pin: u8) -> Self {
        assert!(pin < 16, "GPIO pin must be 0-15");
        Self {
            port,
            pin,
            configured: false,
        }
    }

    /// Enable the port clock and apply `mode`
    pub fn configure(&mut self, mode: PinMode) {
        enable_clock(Bus::Apb2, self.port.rcc_enable_bit());

        let base = self.port.base_addr();
        let (offset, shift) = config_field(self.pin);

        #[cfg(target_arch = "arm")]
        // SAFETY: CRL/CRH/BSRR are STM32F1 GPIO MMIO registers. The config
        // register is read-modify-written so other pins keep their setup;
        // BSRR is write-only and atomic.
        unsafe {
            let cr = ptr::read_volatile((base + offset) as *const u32);
            let cr = (cr & !(0xF << shift)) | (mode.config_bits() << shift);
            ptr::write_volatile((base + offset) as *mut u32, cr);

            match mode {
                PinMode::InputPullUp => {
                    ptr::write_volatile((base + GPIO_BSRR_OFFSET) as *mut u32, 1 << self.pin);
                }
                PinMode::InputPullDown => {
                    ptr::write_volatile((base + GPIO_BSRR_OFFSET) as *mut u32, 1 << (self.pin + 16));
                }
                _ => {}
            }
        }

        #[cfg(not(target_arch = "arm"))]
        let _ = (base, offset, shift);

        self.configured = true;
    }

    fn require_configured(&self) -> HalResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(HalError::NotInitialized)
        }
    }

    fn write_bsrr(&self, value: u32) {
        // SAFETY: BSRR writes are atomic and only touch the bits set in `value`
        unsafe {
            ptr::write_volatile((self.port.base_addr() + GPIO_BSRR_OFFSET) as *mut u32, value);
        }
    }

    /// Output latch state
    pub fn output_level(&self) -> HalResult<bool> {
        self.require_configured()?;
        // SAFETY: ODR is a readable GPIO MMIO register
        let odr = unsafe { ptr::read_volatile((self.port.base_addr() + GPIO_ODR_OFFSET) as *const u32) };
        Ok(odr & (1 << self.pin) != 0)
    }
}

impl GpioPin for Stm32f1GpioPin {
    fn set_high(&mut self) -> HalResult<()> {
        self.require_configured()?;
        self.write_bsrr(1 << self.pin);
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        self.require_configured()?;
        self.write_bsrr(1 << (self.pin + 16));
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        self.require_configured()?;
        // SAFETY: IDR is a read-only GPIO MMIO register
        let idr = unsafe { ptr::read_volatile((self.port.base_addr() + GPIO_IDR_OFFSET) as *const u32) };
        Ok(idr & (1 << self.pin) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_addresses() {
        assert_eq!(GpioPort::PortA.base_addr(), 0x4001_0800);
        assert_eq!(GpioPort::PortC.base_addr(), 0x4001_1000);
        assert_eq!(GpioPort::PortC.rcc_enable_bit(), 4);
    }

    #[test]
    fn test_config_field_split() {
        assert_eq!(config_field(0), (GPIO_CRL_OFFSET, 0));
        assert_eq!(config_field(7), (GPIO_CRL_OFFSET, 28));
        assert_eq!(config_field(13), (GPIO_CRH_OFFSET, 20));
    }

    #[test]
    fn test_unconfigured_pin_rejected() {
        let mut pin = Stm32f1GpioPin::new(GpioPort::PortA, 0);
        assert_eq!(pin.set_high(), Err(HalError::NotInitialized));
        assert_eq!(pin.is_high(), Err(HalError::NotInitialized));
    }
}
