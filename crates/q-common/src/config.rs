// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Bootloader configuration
//!
//! All configuration is compile-time. A board picks a [`FlashLayout`] and the
//! rest of [`BootloaderConfig`] comes from `DEFAULT`; nothing can be changed
//! over the wire.

use crate::constants::{
    APP_START, FLASH_BASE, FLASH_END, MANUAL_UPDATE_HOLD_MS, PROTOCOL_VERSION, TRAILER_SIZE,
};
use crate::errors::{Error, Result};
use crate::log::LogLevel;

/// Top-level bootloader configuration
#[derive(Debug, Clone, Copy)]
pub struct BootloaderConfig {
    /// Application flash region and trailer placement
    pub layout: FlashLayout,
    /// Wire protocol settings
    pub protocol: ProtocolConfig,
    /// Button-and-power manual update gesture
    pub manual_update: ManualUpdateConfig,
    /// Minimum level recorded in the boot log
    pub log_level: LogLevel,
}

impl BootloaderConfig {
    /// Default configuration for the STM32F103xE board
    pub const DEFAULT: Self = Self {
        layout: FlashLayout::STM32F103XE,
        protocol: ProtocolConfig::DEFAULT,
        manual_update: ManualUpdateConfig::DEFAULT,
        log_level: LogLevel::Info,
    };

    /// Configuration with a different flash layout
    #[must_use]
    pub const fn with_layout(layout: FlashLayout) -> Self {
        Self {
            layout,
            ..Self::DEFAULT
        }
    }
}

impl Default for BootloaderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Wire protocol configuration
#[derive(Debug, Clone, Copy)]
pub struct ProtocolConfig {
    /// Version reported by `GetVersion`
    pub version: u8,
}

impl ProtocolConfig {
    /// Default protocol configuration
    pub const DEFAULT: Self = Self {
        version: PROTOCOL_VERSION,
    };
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Manual update gesture configuration
#[derive(Debug, Clone, Copy)]
pub struct ManualUpdateConfig {
    /// How long the button must stay pressed
    pub hold_ms: u32,
    /// Whether external power is required for the gesture to count
    pub require_external_power: bool,
}

impl ManualUpdateConfig {
    /// Default gesture: one second, external power required
    pub const DEFAULT: Self = Self {
        hold_ms: MANUAL_UPDATE_HOLD_MS,
        require_external_power: true,
    };
}

impl Default for ManualUpdateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Application region of code flash
///
/// ```text
/// flash_base      app_start                         trailer    flash_end
///     | bootloader |  application image ...           |crc|size|
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLayout {
    /// Flash base address
    pub flash_base: u32,
    /// First byte of the application region
    pub app_start: u32,
    /// One past the last byte of flash
    pub flash_end: u32,
}

impl FlashLayout {
    /// STM32F103xE: 512 KB flash, 16 KB bootloader
    pub const STM32F103XE: Self = Self {
        flash_base: FLASH_BASE,
        app_start: APP_START,
        flash_end: FLASH_END,
    };

    /// Address of the 8-byte trailer
    #[must_use]
    pub const fn trailer_address(&self) -> u32 {
        self.flash_end - TRAILER_SIZE
    }

    /// Largest image that fits in front of the trailer
    #[must_use]
    pub const fn max_app_size(&self) -> u32 {
        self.trailer_address() - self.app_start
    }

    /// Size of the erasable application region including the trailer
    #[must_use]
    pub const fn region_size(&self) -> u32 {
        self.flash_end - self.app_start
    }

    /// Check whether `[address, address + len)` lies in front of the trailer
    #[must_use]
    pub const fn contains_image_range(&self, address: u32, len: u32) -> bool {
        if address < self.app_start {
            return false;
        }
        match address.checked_add(len) {
            Some(end) => end <= self.trailer_address(),
            None => false,
        }
    }

    /// Check that the layout is usable with the given erase page size
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBootConfig`] if the region is empty, starts
    /// before flash, or is not page aligned at either end.
    pub const fn validate(&self, page_size: u32) -> Result<()> {
        if page_size == 0
            || self.app_start < self.flash_base
            || self.flash_end <= self.app_start
            || self.region_size() <= TRAILER_SIZE
            || self.app_start % page_size != 0
            || self.flash_end % page_size != 0
        {
            return Err(Error::InvalidBootConfig);
        }
        Ok(())
    }
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::STM32F103XE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLASH_PAGE_SIZE;

    #[test]
    fn test_default_layout_valid() {
        assert!(FlashLayout::STM32F103XE.validate(FLASH_PAGE_SIZE).is_ok());
        assert_eq!(FlashLayout::STM32F103XE.trailer_address(), 0x0807_FFF8);
        assert_eq!(FlashLayout::STM32F103XE.max_app_size(), 0x0007_BFF8);
    }

    #[test]
    fn test_unaligned_layout_rejected() {
        let layout = FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0800_0100,
            flash_end: 0x0800_1000,
        };
        assert_eq!(layout.validate(0x400), Err(Error::InvalidBootConfig));
    }

    #[test]
    fn test_image_range_stops_at_trailer() {
        let layout = FlashLayout::STM32F103XE;
        assert!(layout.contains_image_range(layout.app_start, 16));
        assert!(layout.contains_image_range(layout.trailer_address() - 16, 16));
        assert!(!layout.contains_image_range(layout.trailer_address() - 8, 16));
        assert!(!layout.contains_image_range(layout.app_start - 2, 2));
        assert!(!layout.contains_image_range(u32::MAX - 4, 16));
    }
}
