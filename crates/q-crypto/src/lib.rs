// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Firmware Cipher
//!
//! Decrypts firmware images as they stream in over the update link. The
//! bootloader never holds a whole image, so the cipher works one 16-byte
//! block at a time with a single chain register of state.
//!
//! # Supported Algorithms
//!
//! - AES-128 forward cipher (FIPS-197), software implementation
//! - CFB-128 decryption for the bootloader, encryption for host tooling
//!
//! # Security Requirements
//!
//! - Key schedules and chain registers are zeroized on drop
//! - Key material is never logged or exposed through `Debug`
//! - Known-answer self test runs before the first update is accepted

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

#[cfg(feature = "std")]
extern crate std;

// Core cryptographic modules
pub mod error;
pub mod traits;

// Block cipher and stream mode
pub mod aes;
pub mod cfb;

// Known Answer Tests
pub mod kat;

// Re-export main traits and types
pub use aes::{expand_key, FirmwareKey, RoundKeys};
pub use cfb::{CfbDecryptor, CfbEncryptor};
pub use error::{CryptoError, CryptoResult};
pub use kat::self_test;
pub use traits::BlockCipher;
