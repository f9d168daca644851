// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Cryptographic traits
//!
//! The stream modes are written against [`BlockCipher`] so the software AES
//! can be swapped for a hardware engine on parts that have one.

/// Forward block permutation
///
/// CFB only ever runs the cipher forward, so there is no decrypt method.
pub trait BlockCipher {
    /// Block size in bytes
    const BLOCK_SIZE: usize;

    /// Encrypt one block in place
    fn encrypt_block(&self, block: &mut [u8; 16]);
}

impl<C: BlockCipher> BlockCipher for &C {
    const BLOCK_SIZE: usize = C::BLOCK_SIZE;

    fn encrypt_block(&self, block: &mut [u8; 16]) {
        (**self).encrypt_block(block);
    }
}

/// Constant-time comparison
///
/// Compares two byte slices in constant time to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
