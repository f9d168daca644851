// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot-time image validation
//!
//! The image is accepted only when the CRC of its words matches the trailer.
//! The CRC is the STM32 hardware CRC unit's algorithm (poly `0x04C11DB7`,
//! init `0xFFFF_FFFF`, no reflection, no final XOR) applied to 32-bit words
//! read little-endian from flash and fed most significant byte first, so a
//! host tool or the hardware unit produce the same value.
//!
//! An image whose size is not a multiple of 4 ends in a partial word. Its
//! missing bytes count as erased (`0xFF`), which is what the flash holds
//! there after an update, so every image byte is covered.
//!
//! A computed CRC of `0x0000_0000` or `0xFFFF_FFFF` is never accepted: those
//! are what blank or zeroed flash folds to, and an erased trailer would match
//! the second one.

use crate::trailer::Trailer;
use crc::{Crc, Digest, CRC_32_MPEG_2};
use q_common::config::FlashLayout;
use q_common::constants::{CRC_SENTINEL_ERASED, CRC_SENTINEL_ZERO, FLASH_ERASED_BYTE};
use q_hal::{FlashInterface, HalResult};

/// STM32 CRC unit algorithm
const STM32_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Bytes read from flash per request
const READ_CHUNK: usize = 64;

/// Outcome of an image check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// CRC matches the trailer
    Valid,
    /// Trailer size exceeds the application region
    Oversize,
    /// Computed CRC is a blank-flash sentinel
    BlankSentinel,
    /// Computed CRC differs from the trailer
    Mismatch,
    /// Flash could not be read
    Unreadable,
}

impl Verdict {
    /// Short name for the boot log
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Oversize => "oversize",
            Self::BlankSentinel => "blank",
            Self::Mismatch => "crc mismatch",
            Self::Unreadable => "unreadable",
        }
    }
}

/// Whether `crc` is one of the values blank flash produces
#[must_use]
pub const fn is_sentinel(crc: u32) -> bool {
    crc == CRC_SENTINEL_ZERO || crc == CRC_SENTINEL_ERASED
}

/// CRC of the image in `[start, start + size)`
///
/// # Errors
///
/// Propagates flash read errors.
pub fn image_crc<F: FlashInterface>(flash: &F, start: u32, size: u32) -> HalResult<u32> {
    let mut digest = STM32_CRC.digest();
    let mut remaining = size;
    let mut address = start;
    let mut chunk = [0u8; READ_CHUNK];

    while remaining > 0 {
        let len = remaining.min(READ_CHUNK as u32);
        let buf = &mut chunk[..len as usize];
        flash.read(address, buf)?;
        fold_words(&mut digest, buf);
        address += len;
        remaining -= len;
    }

    Ok(digest.finalize())
}

/// CRC of a plaintext image held in memory, as the trailer expects it
#[must_use]
pub fn image_crc_bytes(image: &[u8]) -> u32 {
    let mut digest = STM32_CRC.digest();
    fold_words(&mut digest, image);
    digest.finalize()
}

// Chunks other than the last are a multiple of 4, so only the image's final
// word can be partial
fn fold_words(digest: &mut Digest<'_, u32>, bytes: &[u8]) {
    for word in bytes.chunks(4) {
        let mut padded = [FLASH_ERASED_BYTE; 4];
        padded[..word.len()].copy_from_slice(word);
        digest.update(&u32::from_le_bytes(padded).to_be_bytes());
    }
}

/// Classify the resident image
pub fn check<F: FlashInterface>(flash: &F, layout: &FlashLayout) -> Verdict {
    let Ok(trailer) = Trailer::read(flash, layout) else {
        return Verdict::Unreadable;
    };

    if trailer.size > layout.max_app_size() {
        return Verdict::Oversize;
    }

    let crc = match image_crc(flash, layout.app_start, trailer.size) {
        Ok(crc) => crc,
        Err(_) => return Verdict::Unreadable,
    };

    if is_sentinel(crc) {
        Verdict::BlankSentinel
    } else if crc == trailer.crc32 {
        Verdict::Valid
    } else {
        Verdict::Mismatch
    }
}

/// Whether the resident image may be executed
pub fn is_valid<F: FlashInterface>(flash: &F, layout: &FlashLayout) -> bool {
    check(flash, layout) == Verdict::Valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc_of(words: &[u32]) -> u32 {
        let mut bytes = [0u8; 16];
        for (dst, w) in bytes.chunks_exact_mut(4).zip(words) {
            dst.copy_from_slice(&w.to_le_bytes());
        }
        image_crc_bytes(&bytes[..words.len() * 4])
    }

    #[test]
    fn test_stm32_reference_values() {
        assert_eq!(crc_of(&[0x1234_5678]), 0xDF8A_8A2B);
        assert_eq!(crc_of(&[0]), 0xC704_DD7B);
        assert_eq!(crc_of(&[0x0403_0201, 0x0807_0605]), 0xA314_1BDA);
    }

    #[test]
    fn test_erased_word_hits_sentinel() {
        assert_eq!(crc_of(&[0xFFFF_FFFF]), 0);
        assert!(is_sentinel(crc_of(&[0xFFFF_FFFF])));
        // No words at all leaves the initial value
        assert!(is_sentinel(crc_of(&[])));
    }

    #[test]
    fn test_partial_word_padded_as_erased() {
        let tail = image_crc_bytes(&[1, 2, 3, 4, 5]);
        assert_eq!(tail, image_crc_bytes(&[1, 2, 3, 4, 5, 0xFF, 0xFF, 0xFF]));
        assert_ne!(tail, image_crc_bytes(&[1, 2, 3, 4]));
        assert_ne!(tail, image_crc_bytes(&[1, 2, 3, 4, 6]));
    }

    #[test]
    fn test_short_image_is_one_word() {
        assert_eq!(image_crc_bytes(&[0x78]), crc_of(&[0xFFFF_FF78]));
        assert!(!is_sentinel(image_crc_bytes(&[0x78])));
        // A lone erased byte is still blank flash
        assert!(is_sentinel(image_crc_bytes(&[0xFF])));
    }
}
