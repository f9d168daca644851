// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! AES-128 forward cipher (FIPS-197)
//!
//! Byte-oriented implementation sized for a Cortex-M3 bootloader: one
//! 256-byte S-box, no T-tables and no inverse cipher. The state is kept in
//! FIPS-197 column-major order, so `state[r + 4 * c]` is row `r` of column
//! `c` and the input block maps onto it without reshuffling.
//!
//! # Security
//!
//! S-box lookups are data-dependent memory accesses. The target parts have
//! no data cache, so the lookup time does not depend on the index there.

use crate::error::{CryptoError, CryptoResult};
use crate::traits::BlockCipher;
use q_common::constants::{AES128_KEY_SIZE, AES128_ROUNDS, AES128_ROUND_KEYS, AES_BLOCK_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Tables
// ============================================================================

#[rustfmt::skip]
const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

/// Key schedule round constants
const RCON: [u8; AES128_ROUNDS] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

// ============================================================================
// Key types
// ============================================================================

/// Provisioned 128-bit firmware key
///
/// Zeroized on drop. Deliberately has no `Debug` impl.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FirmwareKey([u8; AES128_KEY_SIZE]);

impl FirmwareKey {
    /// Wrap raw key bytes
    #[must_use]
    pub const fn new(bytes: [u8; AES128_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] unless the slice is exactly 16 bytes.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; AES128_KEY_SIZE] = slice.try_into().map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Whether the key looks like unprogrammed or wiped storage
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF) || self.0.iter().all(|&b| b == 0x00)
    }

    /// Raw key bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; AES128_KEY_SIZE] {
        &self.0
    }
}

/// Expanded AES-128 key schedule: 11 round keys of 16 bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RoundKeys {
    keys: [[u8; AES_BLOCK_SIZE]; AES128_ROUND_KEYS],
}

impl RoundKeys {
    /// Round key `index` (0 is the whitening key)
    #[must_use]
    pub fn round_key(&self, index: usize) -> Option<&[u8; AES_BLOCK_SIZE]> {
        self.keys.get(index)
    }

    /// Encrypt one block in place
    pub fn encrypt(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        add_round_key(block, &self.keys[0]);
        for round in 1..AES128_ROUNDS {
            sub_bytes(block);
            shift_rows(block);
            mix_columns(block);
            add_round_key(block, &self.keys[round]);
        }
        sub_bytes(block);
        shift_rows(block);
        add_round_key(block, &self.keys[AES128_ROUNDS]);
    }
}

impl BlockCipher for RoundKeys {
    const BLOCK_SIZE: usize = AES_BLOCK_SIZE;

    fn encrypt_block(&self, block: &mut [u8; 16]) {
        self.encrypt(block);
    }
}

// ============================================================================
// Key expansion
// ============================================================================

/// Expand a 128-bit key into its 11 round keys
#[must_use]
pub fn expand_key(key: &FirmwareKey) -> RoundKeys {
    let mut schedule = RoundKeys {
        keys: [[0u8; AES_BLOCK_SIZE]; AES128_ROUND_KEYS],
    };
    schedule.keys[0] = *key.as_bytes();

    for round in 1..AES128_ROUND_KEYS {
        let prev = schedule.keys[round - 1];
        let mut next = [0u8; AES_BLOCK_SIZE];

        // First word: RotWord, SubWord, Rcon
        let mut temp = [prev[13], prev[14], prev[15], prev[12]];
        for b in &mut temp {
            *b = SBOX[usize::from(*b)];
        }
        temp[0] ^= RCON[round - 1];

        for word in 0..4 {
            for i in 0..4 {
                let feed = if word == 0 { temp[i] } else { next[4 * (word - 1) + i] };
                next[4 * word + i] = prev[4 * word + i] ^ feed;
            }
        }
        schedule.keys[round] = next;
    }

    schedule
}

/// One-shot encryption of a single block under `round_keys`
#[must_use]
pub fn encrypt_block(round_keys: &RoundKeys, block: &[u8; AES_BLOCK_SIZE]) -> [u8; AES_BLOCK_SIZE] {
    let mut out = *block;
    round_keys.encrypt(&mut out);
    out
}

// ============================================================================
// Round transforms
// ============================================================================

#[inline]
fn add_round_key(state: &mut [u8; AES_BLOCK_SIZE], key: &[u8; AES_BLOCK_SIZE]) {
    for (s, k) in state.iter_mut().zip(key) {
        *s ^= k;
    }
}

#[inline]
fn sub_bytes(state: &mut [u8; AES_BLOCK_SIZE]) {
    for b in state.iter_mut() {
        *b = SBOX[usize::from(*b)];
    }
}

/// Row `r` rotates left by `r` columns
#[inline]
fn shift_rows(state: &mut [u8; AES_BLOCK_SIZE]) {
    let old = *state;
    for row in 1..4 {
        for col in 0..4 {
            state[row + 4 * col] = old[row + 4 * ((col + row) % 4)];
        }
    }
}

/// Multiply by x in GF(2^8) without branching on the operand
#[inline]
const fn xtime(b: u8) -> u8 {
    (b << 1) ^ (0x1b & (b >> 7).wrapping_neg())
}

#[inline]
fn mix_columns(state: &mut [u8; AES_BLOCK_SIZE]) {
    for column in state.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        let all = a0 ^ a1 ^ a2 ^ a3;
        column[0] = a0 ^ all ^ xtime(a0 ^ a1);
        column[1] = a1 ^ all ^ xtime(a1 ^ a2);
        column[2] = a2 ^ all ^ xtime(a2 ^ a3);
        column[3] = a3 ^ all ^ xtime(a3 ^ a0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIPS197_KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    #[test]
    fn test_key_expansion_appendix_a1() {
        let schedule = expand_key(&FirmwareKey::new(FIPS197_KEY));
        // w[4..8] and w[40..44] from FIPS-197 Appendix A.1
        assert_eq!(
            schedule.round_key(1),
            Some(&[
                0xa0, 0xfa, 0xfe, 0x17, 0x88, 0x54, 0x2c, 0xb1, 0x23, 0xa3, 0x39, 0x39, 0x2a, 0x6c,
                0x76, 0x05
            ])
        );
        assert_eq!(
            schedule.round_key(10),
            Some(&[
                0xd0, 0x14, 0xf9, 0xa8, 0xc9, 0xee, 0x25, 0x89, 0xe1, 0x3f, 0x0c, 0xc8, 0xb6, 0x63,
                0x0c, 0xa6
            ])
        );
        assert!(schedule.round_key(11).is_none());
    }

    #[test]
    fn test_encrypt_appendix_b() {
        let schedule = expand_key(&FirmwareKey::new(FIPS197_KEY));
        let input = [
            0x32, 0x43, 0xf6, 0xa8, 0x88, 0x5a, 0x30, 0x8d, 0x31, 0x31, 0x98, 0xa2, 0xe0, 0x37, 0x07,
            0x34,
        ];
        let expected = [
            0x39, 0x25, 0x84, 0x1d, 0x02, 0xdc, 0x09, 0xfb, 0xdc, 0x11, 0x85, 0x97, 0x19, 0x6a, 0x0b,
            0x32,
        ];
        assert_eq!(encrypt_block(&schedule, &input), expected);
    }

    #[test]
    fn test_xtime() {
        assert_eq!(xtime(0x57), 0xae);
        assert_eq!(xtime(0xae), 0x47);
        assert_eq!(xtime(0x80), 0x1b);
    }

    #[test]
    fn test_shift_rows_moves_rows_only() {
        let mut state: [u8; 16] = core::array::from_fn(|i| i as u8);
        shift_rows(&mut state);
        // Row 0 untouched, row 1 rotated by one column
        assert_eq!([state[0], state[4], state[8], state[12]], [0, 4, 8, 12]);
        assert_eq!([state[1], state[5], state[9], state[13]], [5, 9, 13, 1]);
    }

    #[test]
    fn test_key_from_slice() {
        assert!(FirmwareKey::from_slice(&[0u8; 15]).is_err());
        let key = FirmwareKey::from_slice(&FIPS197_KEY).unwrap();
        assert!(!key.is_blank());
        assert!(FirmwareKey::new([0xFF; 16]).is_blank());
        assert!(FirmwareKey::new([0x00; 16]).is_blank());
    }
}
