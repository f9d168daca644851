// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Known Answer Tests (KAT) for the firmware cipher
//!
//! Run once at startup before any update is accepted, so a miscompiled or
//! corrupted cipher is caught before it writes garbage into flash.
//!
//! # Test Vector Sources
//!
//! - AES-128 block: FIPS-197 Appendix C.1 and Appendix B
//! - CFB-128: NIST SP 800-38A F.3.14 (first two blocks)
//!
//! # Usage
//!
//! ```
//! use q_crypto::kat::self_test;
//!
//! let results = self_test();
//! assert!(results.all_passed());
//! ```

use crate::aes::{encrypt_block, expand_key, FirmwareKey};
use crate::cfb::CfbDecryptor;
use crate::error::{CryptoError, CryptoResult};
use crate::traits::constant_time_eq;

// ============================================================================
// KAT Result Types
// ============================================================================

/// Result of a single KAT test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KatTestResult {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
}

impl KatTestResult {
    const fn from_match(ok: bool) -> Self {
        if ok {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

/// Results of all KAT tests
#[derive(Debug, Clone, Copy)]
pub struct KatResults {
    /// AES-128 single block, FIPS-197 C.1
    pub aes128_c1: KatTestResult,
    /// AES-128 single block, FIPS-197 Appendix B
    pub aes128_b: KatTestResult,
    /// CFB-128 decryption, SP 800-38A F.3.14
    pub cfb128_decrypt: KatTestResult,
}

impl KatResults {
    fn all(&self) -> [KatTestResult; 3] {
        [self.aes128_c1, self.aes128_b, self.cfb128_decrypt]
    }

    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.all().iter().filter(|&&t| t == KatTestResult::Failed).count()
    }

    /// Collapse into a result
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SelfTestFailed`] if any vector failed.
    pub fn into_result(self) -> CryptoResult<()> {
        if self.all_passed() {
            Ok(())
        } else {
            Err(CryptoError::SelfTestFailed)
        }
    }
}

// ============================================================================
// AES-128 block vectors (FIPS-197)
// ============================================================================

const C1_KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];
const C1_PLAINTEXT: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];
const C1_CIPHERTEXT: [u8; 16] = [
    0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4, 0xc5, 0x5a,
];

/// Key shared by Appendix B and SP 800-38A
const NIST_KEY: [u8; 16] = [
    0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
];
const B_PLAINTEXT: [u8; 16] = [
    0x32, 0x43, 0xf6, 0xa8, 0x88, 0x5a, 0x30, 0x8d, 0x31, 0x31, 0x98, 0xa2, 0xe0, 0x37, 0x07, 0x34,
];
const B_CIPHERTEXT: [u8; 16] = [
    0x39, 0x25, 0x84, 0x1d, 0x02, 0xdc, 0x09, 0xfb, 0xdc, 0x11, 0x85, 0x97, 0x19, 0x6a, 0x0b, 0x32,
];

/// FIPS-197 Appendix C.1
#[must_use]
pub fn kat_aes128_c1() -> KatTestResult {
    let schedule = expand_key(&FirmwareKey::new(C1_KEY));
    let out = encrypt_block(&schedule, &C1_PLAINTEXT);
    KatTestResult::from_match(constant_time_eq(&out, &C1_CIPHERTEXT))
}

/// FIPS-197 Appendix B
#[must_use]
pub fn kat_aes128_b() -> KatTestResult {
    let schedule = expand_key(&FirmwareKey::new(NIST_KEY));
    let out = encrypt_block(&schedule, &B_PLAINTEXT);
    KatTestResult::from_match(constant_time_eq(&out, &B_CIPHERTEXT))
}

// ============================================================================
// CFB-128 vectors (SP 800-38A)
// ============================================================================

const CFB_IV: [u8; 16] = C1_KEY;

#[rustfmt::skip]
const CFB_PLAINTEXT: [u8; 32] = [
    0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
    0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf, 0x8e, 0x51,
];

#[rustfmt::skip]
const CFB_CIPHERTEXT: [u8; 32] = [
    0x3b, 0x3f, 0xd9, 0x2e, 0xb7, 0x2d, 0xad, 0x20, 0x33, 0x34, 0x49, 0xf8, 0xe8, 0x3c, 0xfb, 0x4a,
    0xc8, 0xa6, 0x45, 0x37, 0xa0, 0xb3, 0xa9, 0x3f, 0xcd, 0xe3, 0xcd, 0xad, 0x9f, 0x1c, 0xe5, 0x8b,
];

/// SP 800-38A F.3.14 (CFB128-AES128.Decrypt), blocks 1 and 2
#[must_use]
pub fn kat_cfb128_decrypt() -> KatTestResult {
    let schedule = expand_key(&FirmwareKey::new(NIST_KEY));
    let mut decryptor = CfbDecryptor::new(&schedule, CFB_IV);
    let mut data = CFB_CIPHERTEXT;
    if decryptor.decrypt_blocks(&mut data).is_err() {
        return KatTestResult::Failed;
    }
    KatTestResult::from_match(constant_time_eq(&data, &CFB_PLAINTEXT))
}

/// Run every vector
#[must_use]
pub fn self_test() -> KatResults {
    KatResults {
        aes128_c1: kat_aes128_c1(),
        aes128_b: kat_aes128_b(),
        cfb128_decrypt: kat_cfb128_decrypt(),
    }
}
