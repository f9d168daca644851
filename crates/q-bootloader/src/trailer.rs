// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Image trailer
//!
//! The last eight bytes of flash describe the resident image:
//!
//! ```text
//! FlashEnd - 8: crc32  (u32 LE)
//! FlashEnd - 4: size   (u32 LE, plaintext bytes)
//! ```
//!
//! It is written only by `WriteFinal`, after the whole region was erased, so
//! an interrupted update leaves it erased and the image invalid.

use q_common::config::FlashLayout;
use q_hal::{FlashInterface, HalResult, ProgramBracket};

/// Decoded trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Expected CRC of the image words
    pub crc32: u32,
    /// Plaintext image size in bytes
    pub size: u32,
}

impl Trailer {
    /// Trailer of an erased region
    pub const ERASED: Self = Self {
        crc32: 0xFFFF_FFFF,
        size: 0xFFFF_FFFF,
    };

    /// Read the trailer at the end of `layout`
    ///
    /// # Errors
    ///
    /// Propagates flash read errors.
    pub fn read<F: FlashInterface>(flash: &F, layout: &FlashLayout) -> HalResult<Self> {
        let base = layout.trailer_address();
        Ok(Self {
            crc32: flash.read_u32(base)?,
            size: flash.read_u32(base + 4)?,
        })
    }

    /// The trailer as four little-endian half-words, in address order
    #[must_use]
    pub const fn half_words(&self) -> [u16; 4] {
        [
            self.crc32 as u16,
            (self.crc32 >> 16) as u16,
            self.size as u16,
            (self.size >> 16) as u16,
        ]
    }

    /// Program the trailer inside an open bracket
    ///
    /// # Errors
    ///
    /// Stops at the first half-word that fails to program.
    pub fn write<F: FlashInterface>(
        &self,
        bracket: &mut ProgramBracket<'_, F>,
        layout: &FlashLayout,
    ) -> HalResult<()> {
        let mut address = layout.trailer_address();
        for half in self.half_words() {
            bracket.program_half_word(address, half)?;
            address += 2;
        }
        Ok(())
    }

    /// Whether the trailer area is still erased
    #[must_use]
    pub fn is_erased(&self) -> bool {
        *self == Self::ERASED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_word_order() {
        let trailer = Trailer {
            crc32: 0xDF8A_8A2B,
            size: 0x0001_0204,
        };
        assert_eq!(trailer.half_words(), [0x8A2B, 0xDF8A, 0x0204, 0x0001]);
    }

    #[test]
    fn test_erased() {
        assert!(Trailer::ERASED.is_erased());
        assert!(!Trailer { crc32: 0, size: 0xFFFF_FFFF }.is_erased());
    }
}
