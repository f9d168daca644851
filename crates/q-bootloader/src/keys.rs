// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Firmware key provisioning
//!
//! The key is written into a reserved page of the bootloader region at the
//! factory. Reads go through the flash driver the orchestrator already owns.

use q_common::constants::{AES128_KEY_SIZE, KEY_PAGE_ADDRESS};
use q_common::{Error, Result};
use q_crypto::FirmwareKey;
use q_hal::FlashInterface;
use zeroize::Zeroize;

/// Source of the firmware decryption key
pub trait KeyStore {
    /// Fetch the key
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotProvisioned`] if no usable key is stored.
    fn firmware_key<F: FlashInterface>(&self, flash: &F) -> Result<FirmwareKey>;
}

/// Key stored in flash at a fixed address
#[derive(Debug, Clone, Copy)]
pub struct FlashKeyStore {
    address: u32,
}

impl FlashKeyStore {
    /// Key at the default provisioning page
    pub const DEFAULT: Self = Self::at(KEY_PAGE_ADDRESS);

    /// Key at `address`
    #[must_use]
    pub const fn at(address: u32) -> Self {
        Self { address }
    }
}

impl Default for FlashKeyStore {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl KeyStore for FlashKeyStore {
    fn firmware_key<F: FlashInterface>(&self, flash: &F) -> Result<FirmwareKey> {
        let mut raw = [0u8; AES128_KEY_SIZE];
        flash.read(self.address, &mut raw)?;
        let key = FirmwareKey::new(raw);
        raw.zeroize();

        if key.is_blank() {
            return Err(Error::KeyNotProvisioned);
        }
        Ok(key)
    }
}

/// Key compiled in or injected by a test
pub struct StaticKeyStore {
    key: FirmwareKey,
}

impl StaticKeyStore {
    /// Wrap a key
    #[must_use]
    pub const fn new(key: FirmwareKey) -> Self {
        Self { key }
    }
}

impl KeyStore for StaticKeyStore {
    fn firmware_key<F: FlashInterface>(&self, _flash: &F) -> Result<FirmwareKey> {
        Ok(self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q_hal::sim::SimFlash;

    type Flash = SimFlash<0x0800_0000, 0x1000, 0x400>;

    #[test]
    fn test_blank_page_not_provisioned() {
        let flash = Flash::new();
        let store = FlashKeyStore::at(0x0800_0400);
        assert!(matches!(store.firmware_key(&flash), Err(Error::KeyNotProvisioned)));
    }

    #[test]
    fn test_provisioned_key_read_back() {
        let mut flash = Flash::new();
        let key: [u8; 16] = core::array::from_fn(|i| i as u8 + 1);
        flash.preload(0x0800_0400, &key).unwrap();

        let read = FlashKeyStore::at(0x0800_0400).firmware_key(&flash).unwrap();
        assert_eq!(read.as_bytes(), &key);
    }

    #[test]
    fn test_out_of_range_is_overflow() {
        let flash = Flash::new();
        let store = FlashKeyStore::at(0x0900_0000);
        assert!(matches!(store.firmware_key(&flash), Err(Error::ImageOverflow)));
    }
}
