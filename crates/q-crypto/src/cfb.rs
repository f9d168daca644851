// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Full-block cipher feedback mode (CFB-128)
//!
//! ```text
//! decrypt:  ks = E(chain); pt = ct ^ ks; chain = ct
//! encrypt:  ks = E(chain); ct = pt ^ ks; chain = ct
//! ```
//!
//! Only whole 16-byte blocks are processed. Firmware images are padded
//! before encryption: the final plaintext block ends with a pad byte `p`
//! and carries `16 - p` payload bytes.

use crate::error::{CryptoError, CryptoResult};
use crate::traits::BlockCipher;
use q_common::constants::AES_BLOCK_SIZE;
use zeroize::Zeroize;

/// Block as handled by the stream modes
pub type Block = [u8; AES_BLOCK_SIZE];

/// All-zero initialization vector used by the bootloader protocol
pub const ZERO_IV: Block = [0u8; AES_BLOCK_SIZE];

// ============================================================================
// Decryptor
// ============================================================================

/// Streaming CFB decryptor
///
/// The chain register is zeroized on drop.
pub struct CfbDecryptor<C: BlockCipher> {
    cipher: C,
    chain: Block,
}

impl<C: BlockCipher> CfbDecryptor<C> {
    /// Start a stream at `iv`
    pub const fn new(cipher: C, iv: Block) -> Self {
        Self { cipher, chain: iv }
    }

    /// Start a stream at the zero IV
    pub const fn with_zero_iv(cipher: C) -> Self {
        Self::new(cipher, ZERO_IV)
    }

    /// Decrypt one block in place and advance the chain
    pub fn decrypt_block(&mut self, block: &mut Block) {
        let mut keystream = self.chain;
        self.cipher.encrypt_block(&mut keystream);
        self.chain = *block;
        for (b, k) in block.iter_mut().zip(&keystream) {
            *b ^= k;
        }
        keystream.zeroize();
    }

    /// Decrypt a run of whole blocks in place
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidCiphertext`] if `data` is not a multiple
    /// of the block size; nothing is decrypted in that case.
    pub fn decrypt_blocks(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertext);
        }
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.decrypt_block(&mut block);
            chunk.copy_from_slice(&block);
            block.zeroize();
        }
        Ok(())
    }

    /// Current chain register
    #[must_use]
    pub const fn chain(&self) -> &Block {
        &self.chain
    }

    /// Borrow the block cipher
    pub const fn cipher(&self) -> &C {
        &self.cipher
    }
}

impl<C: BlockCipher> Drop for CfbDecryptor<C> {
    fn drop(&mut self) {
        self.chain.zeroize();
    }
}

// ============================================================================
// Encryptor
// ============================================================================

/// Streaming CFB encryptor, the host-side counterpart of [`CfbDecryptor`]
pub struct CfbEncryptor<C: BlockCipher> {
    cipher: C,
    chain: Block,
}

impl<C: BlockCipher> CfbEncryptor<C> {
    /// Start a stream at `iv`
    pub const fn new(cipher: C, iv: Block) -> Self {
        Self { cipher, chain: iv }
    }

    /// Start a stream at the zero IV
    pub const fn with_zero_iv(cipher: C) -> Self {
        Self::new(cipher, ZERO_IV)
    }

    /// Encrypt one block in place and advance the chain
    pub fn encrypt_block(&mut self, block: &mut Block) {
        let mut keystream = self.chain;
        self.cipher.encrypt_block(&mut keystream);
        for (b, k) in block.iter_mut().zip(&keystream) {
            *b ^= k;
        }
        self.chain = *block;
        keystream.zeroize();
    }

    /// Encrypt a run of whole blocks in place
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BufferTooSmall`] if `data` is not a multiple of
    /// the block size.
    pub fn encrypt_blocks(&mut self, data: &mut [u8]) -> CryptoResult<()> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptoError::BufferTooSmall);
        }
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.encrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }
        Ok(())
    }
}

impl<C: BlockCipher> Drop for CfbEncryptor<C> {
    fn drop(&mut self) {
        self.chain.zeroize();
    }
}

// ============================================================================
// Image padding
// ============================================================================

/// Ciphertext length for a plaintext image of `len` bytes
///
/// There is always a final padding block, even when `len` is block aligned.
#[must_use]
pub const fn padded_len(len: usize) -> usize {
    (len / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE
}

/// Pad byte appended to an image of `len` bytes (1..=16)
#[must_use]
pub const fn pad_value(len: usize) -> u8 {
    (AES_BLOCK_SIZE - len % AES_BLOCK_SIZE) as u8
}

/// Number of payload bytes carried by a decrypted final block
///
/// A pad byte of 16 or more leaves nothing to write.
#[must_use]
pub const fn final_payload_len(final_block: &Block) -> usize {
    let pad = final_block[AES_BLOCK_SIZE - 1] as usize;
    AES_BLOCK_SIZE.saturating_sub(pad)
}

/// Pad and encrypt a firmware image under the zero IV
///
/// Writes [`padded_len`]`(image.len())` bytes to `out` and returns that
/// length. The last 16 bytes are the `WriteFinal` block; everything before
/// them goes out as `WriteMemory`.
///
/// # Errors
///
/// Returns [`CryptoError::BufferTooSmall`] if `out` cannot hold the result.
pub fn pack_image<C: BlockCipher>(cipher: C, image: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
    let total = padded_len(image.len());
    let out = out.get_mut(..total).ok_or(CryptoError::BufferTooSmall)?;

    out[..image.len()].copy_from_slice(image);
    let pad = pad_value(image.len());
    for b in &mut out[image.len()..] {
        *b = pad;
    }

    CfbEncryptor::with_zero_iv(cipher).encrypt_blocks(out)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::{expand_key, FirmwareKey};

    fn key() -> FirmwareKey {
        FirmwareKey::new([
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ])
    }

    #[test]
    fn test_decrypt_chains_on_ciphertext() {
        let schedule = expand_key(&key());
        let mut dec = CfbDecryptor::with_zero_iv(&schedule);
        let mut block = [0x11u8; 16];
        let ct = block;
        dec.decrypt_block(&mut block);
        assert_eq!(dec.chain(), &ct);
    }

    #[test]
    fn test_decrypt_blocks_rejects_partial() {
        let schedule = expand_key(&key());
        let mut dec = CfbDecryptor::with_zero_iv(&schedule);
        let mut data = [0u8; 20];
        assert_eq!(dec.decrypt_blocks(&mut data), Err(CryptoError::InvalidCiphertext));
        assert_eq!(dec.chain(), &ZERO_IV);
    }

    #[test]
    fn test_padding_arithmetic() {
        assert_eq!(padded_len(0), 16);
        assert_eq!(padded_len(15), 16);
        assert_eq!(padded_len(16), 32);
        assert_eq!(pad_value(16), 16);
        assert_eq!(pad_value(17), 15);

        let mut block = [0u8; 16];
        block[15] = 11;
        assert_eq!(final_payload_len(&block), 5);
        block[15] = 16;
        assert_eq!(final_payload_len(&block), 0);
        block[15] = 0xC8;
        assert_eq!(final_payload_len(&block), 0);
        block[15] = 0;
        assert_eq!(final_payload_len(&block), 16);
    }

    #[test]
    fn test_pack_then_decrypt() {
        let schedule = expand_key(&key());
        let image = [0xA5u8; 37];
        let mut packed = [0u8; 64];
        let len = pack_image(&schedule, &image, &mut packed).unwrap();
        assert_eq!(len, 48);

        let mut dec = CfbDecryptor::with_zero_iv(&schedule);
        dec.decrypt_blocks(&mut packed[..len]).unwrap();
        assert_eq!(&packed[..37], &image);
        let mut last = [0u8; 16];
        last.copy_from_slice(&packed[32..48]);
        assert_eq!(final_payload_len(&last), 5);
    }

    #[test]
    fn test_pack_needs_room() {
        let schedule = expand_key(&key());
        let mut out = [0u8; 16];
        assert_eq!(
            pack_image(&schedule, &[0u8; 16], &mut out),
            Err(CryptoError::BufferTooSmall)
        );
    }
}
