// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! System-wide constants for the field-update bootloader
//!
//! Wire protocol opcodes, cipher sizes, trailer geometry and the default
//! STM32F103xE flash map. Anything a host tool must agree on lives here.

// =============================================================================
// Cipher Constants
// =============================================================================

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// AES-128 key size in bytes
pub const AES128_KEY_SIZE: usize = 16;

/// Number of AES-128 rounds
pub const AES128_ROUNDS: usize = 10;

/// Number of AES-128 round keys (initial AddRoundKey + one per round)
pub const AES128_ROUND_KEYS: usize = AES128_ROUNDS + 1;

// =============================================================================
// Wire Protocol Constants
// =============================================================================

/// Bootloader protocol version reported by `GetVersion`
pub const PROTOCOL_VERSION: u8 = 1;

/// Opcode: query protocol version
pub const OP_GET_VERSION: u8 = 0;

/// Opcode: decrypt and program whole cipher blocks
pub const OP_WRITE_MEMORY: u8 = 1;

/// Opcode: decrypt final block, strip padding, write trailer
pub const OP_WRITE_FINAL: u8 = 2;

/// Opcode: rewind the address pointer to the application start
pub const OP_RESET_POINTER: u8 = 3;

/// Opcode: report the address pointer
pub const OP_GET_POINTER: u8 = 4;

/// Minimum `WriteFinal` frame length: opcode + block + crc + size
pub const WRITE_FINAL_MIN_LEN: usize = 1 + AES_BLOCK_SIZE + 4 + 4;

/// Largest frame the transport will hand to the dispatcher
pub const MAX_FRAME_SIZE: usize = 255;

/// Largest reply the dispatcher produces (`GetPointer`)
pub const MAX_REPLY_SIZE: usize = 5;

// =============================================================================
// Flash Layout Constants (STM32F103xE)
// =============================================================================

/// Flash base address
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Total flash size (512 KB)
pub const FLASH_SIZE: u32 = 512 * 1024;

/// Flash page size (2 KB on high-density STM32F1)
pub const FLASH_PAGE_SIZE: u32 = 2 * 1024;

/// Space reserved for the bootloader itself (16 KB)
pub const BOOTLOADER_SIZE: u32 = 16 * 1024;

/// First byte of the application region
pub const APP_START: u32 = FLASH_BASE + BOOTLOADER_SIZE;

/// One past the last byte of flash
pub const FLASH_END: u32 = FLASH_BASE + FLASH_SIZE;

/// Value of every byte of an erased page
pub const FLASH_ERASED_BYTE: u8 = 0xFF;

/// Trailer size: crc32 followed by size, both little-endian `u32`
pub const TRAILER_SIZE: u32 = 8;

/// Page inside the bootloader region that holds the provisioned key
pub const KEY_PAGE_ADDRESS: u32 = APP_START - FLASH_PAGE_SIZE;

// =============================================================================
// Integrity Constants
// =============================================================================

/// CRC of erased (all `0xFF`) flash; never a valid image CRC
pub const CRC_SENTINEL_ERASED: u32 = 0xFFFF_FFFF;

/// CRC that a run of erased words folds to; never a valid image CRC
pub const CRC_SENTINEL_ZERO: u32 = 0x0000_0000;

// =============================================================================
// User Interface Constants
// =============================================================================

/// How long the update button must be held with external power present
pub const MANUAL_UPDATE_HOLD_MS: u32 = 1000;

/// Update request mailbox magic written by the application: "QUPD"
pub const UPDATE_REQUEST_MAGIC: u16 = 0x5155;

// =============================================================================
// Logging Constants
// =============================================================================

/// Log tag for the boot orchestrator
pub const LOG_MODULE_BOOT: &str = "boot";

/// Log tag for the command dispatcher
pub const LOG_MODULE_DISPATCH: &str = "dispatch";

/// Log tag for the integrity validator
pub const LOG_MODULE_INTEGRITY: &str = "integrity";

/// Log tag for the cipher self test
pub const LOG_MODULE_CRYPTO: &str = "crypto";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_page_aligned() {
        assert_eq!(APP_START % FLASH_PAGE_SIZE, 0);
        assert_eq!(FLASH_END % FLASH_PAGE_SIZE, 0);
        assert_eq!(KEY_PAGE_ADDRESS % FLASH_PAGE_SIZE, 0);
        assert!(KEY_PAGE_ADDRESS >= FLASH_BASE);
    }

    #[test]
    fn test_write_final_min_len() {
        assert_eq!(WRITE_FINAL_MIN_LEN, 25);
    }
}
