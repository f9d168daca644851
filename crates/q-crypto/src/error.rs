// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Cryptographic error types
//!
//! This module defines error types for the firmware cipher.

use core::fmt;

/// Error type for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key format or size
    InvalidKey,
    /// Ciphertext is malformed (not a whole number of blocks)
    InvalidCiphertext,
    /// Buffer is too small for the operation
    BufferTooSmall,
    /// Final block padding is out of range
    InvalidPadding,
    /// A known-answer vector did not reproduce
    SelfTestFailed,
    /// Internal error (should not occur)
    InternalError,
}

impl CryptoError {
    /// Get error code for logging/debugging
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::InvalidKey => 0x0101,
            Self::InvalidCiphertext => 0x0103,
            Self::BufferTooSmall => 0x0106,
            Self::InvalidPadding => 0x0107,
            Self::SelfTestFailed => 0x010A,
            Self::InternalError => 0x01FF,
        }
    }

    /// Get a short description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid key",
            Self::InvalidCiphertext => "invalid ciphertext",
            Self::BufferTooSmall => "buffer too small",
            Self::InvalidPadding => "invalid padding",
            Self::SelfTestFailed => "self test failed",
            Self::InternalError => "internal error",
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

impl From<CryptoError> for q_common::Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey => Self::InvalidKey,
            CryptoError::InvalidCiphertext | CryptoError::InvalidPadding => {
                Self::InvalidCiphertext
            }
            CryptoError::BufferTooSmall => Self::BufferTooSmall,
            CryptoError::SelfTestFailed => Self::SelfTestFailed,
            CryptoError::InternalError => Self::InternalError,
        }
    }
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_in_crypto_range() {
        for err in [
            CryptoError::InvalidKey,
            CryptoError::InvalidCiphertext,
            CryptoError::BufferTooSmall,
            CryptoError::InvalidPadding,
            CryptoError::SelfTestFailed,
            CryptoError::InternalError,
        ] {
            assert_eq!(err.code() >> 8, 0x01);
        }
    }

    #[test]
    fn test_padding_maps_to_ciphertext() {
        assert_eq!(
            q_common::Error::from(CryptoError::InvalidPadding),
            q_common::Error::InvalidCiphertext
        );
    }
}
