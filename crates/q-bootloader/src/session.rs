// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! State of one update attempt

use q_common::config::FlashLayout;
use q_crypto::cfb::{Block, CfbDecryptor};
use q_crypto::{expand_key, FirmwareKey, RoundKeys};

/// One update attempt
///
/// Created fresh for every attempt with the pointer at the application
/// start and a zero chain register. The key schedule and chain are
/// zeroized when the session is dropped.
pub struct UpdateSession {
    address_pointer: u32,
    decryptor: CfbDecryptor<RoundKeys>,
    in_progress: bool,
    app_start: u32,
    limit: u32,
}

impl UpdateSession {
    /// Start an attempt for `layout` under `key`
    #[must_use]
    pub fn new(key: &FirmwareKey, layout: &FlashLayout) -> Self {
        Self {
            address_pointer: layout.app_start,
            decryptor: CfbDecryptor::with_zero_iv(expand_key(key)),
            in_progress: true,
            app_start: layout.app_start,
            limit: layout.trailer_address(),
        }
    }

    /// Next flash address to be written
    #[must_use]
    pub const fn address_pointer(&self) -> u32 {
        self.address_pointer
    }

    /// Whether the attempt is still waiting for `WriteFinal`
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Rewind the pointer to the application start
    ///
    /// The chain register is left alone; the host restarts its stream by
    /// starting a new attempt, not by rewinding.
    pub fn reset_pointer(&mut self) {
        self.address_pointer = self.app_start;
    }

    /// Decrypt one block in place
    pub fn decrypt_block(&mut self, block: &mut Block) {
        self.decryptor.decrypt_block(block);
    }

    /// Whether `len` bytes fit between the pointer and the trailer
    #[must_use]
    pub const fn has_room(&self, len: u32) -> bool {
        match self.address_pointer.checked_add(len) {
            Some(end) => end <= self.limit,
            None => false,
        }
    }

    /// Move the pointer forward over `len` bytes just written
    ///
    /// Callers check [`has_room`](Self::has_room) before writing.
    pub(crate) fn advance(&mut self, len: u32) {
        debug_assert!(self.has_room(len), "advance past the trailer");
        self.address_pointer += len;
    }

    /// End the attempt
    pub(crate) fn finish(&mut self) {
        self.in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> FlashLayout {
        FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0800_1000,
            flash_end: 0x0800_2000,
        }
    }

    #[test]
    fn test_fresh_session() {
        let session = UpdateSession::new(&FirmwareKey::new([1; 16]), &layout());
        assert_eq!(session.address_pointer(), 0x0800_1000);
        assert!(session.in_progress());
    }

    #[test]
    fn test_room_stops_at_trailer() {
        let mut session = UpdateSession::new(&FirmwareKey::new([1; 16]), &layout());
        let trailer = layout().trailer_address();
        session.advance(trailer - 0x0800_1000 - 16);
        assert!(session.has_room(16));
        session.advance(16);
        assert_eq!(session.address_pointer(), trailer);
        assert!(!session.has_room(1));
        assert!(session.has_room(0));
    }

    #[test]
    #[should_panic(expected = "advance past the trailer")]
    fn test_advance_past_trailer_is_a_bug() {
        let mut session = UpdateSession::new(&FirmwareKey::new([1; 16]), &layout());
        let trailer = layout().trailer_address();
        session.advance(trailer - 0x0800_1000 + 2);
    }

    #[test]
    fn test_reset_pointer() {
        let mut session = UpdateSession::new(&FirmwareKey::new([1; 16]), &layout());
        session.advance(64);
        session.reset_pointer();
        assert_eq!(session.address_pointer(), 0x0800_1000);
    }
}
