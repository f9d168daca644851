// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Comprehensive tests for q-common
//!
//! Tests for error handling, configuration, time keeping and the boot log.

#![cfg(test)]

mod error_tests {
    use q_common::Error;
    use std::collections::HashSet;

    const ALL: [Error; 29] = [
        Error::InvalidKey,
        Error::InvalidCiphertext,
        Error::SelfTestFailed,
        Error::ImageTooLarge,
        Error::ImageCorrupted,
        Error::ImageBlank,
        Error::ImageOverflow,
        Error::UpdateInProgress,
        Error::UpdateAborted,
        Error::UnknownCommand,
        Error::MalformedFrame,
        Error::TransportError,
        Error::HardwareInitFailed,
        Error::FlashError,
        Error::FlashLocked,
        Error::TimerError,
        Error::GpioError,
        Error::UartError,
        Error::WatchdogError,
        Error::InvalidBootConfig,
        Error::InvalidVectorTable,
        Error::KeyNotProvisioned,
        Error::BufferTooSmall,
        Error::InvalidParameter,
        Error::Timeout,
        Error::Busy,
        Error::NotImplemented,
        Error::InvalidState,
        Error::InternalError,
    ];

    #[test]
    fn test_error_codes_unique() {
        let unique: HashSet<u16> = ALL.iter().map(Error::code).collect();
        assert_eq!(unique.len(), ALL.len());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::SelfTestFailed.code() >> 8, 0x01);
        assert_eq!(Error::ImageOverflow.code() >> 8, 0x04);
        assert_eq!(Error::MalformedFrame.code() >> 8, 0x06);
        assert_eq!(Error::FlashLocked.code() >> 8, 0x08);
        assert_eq!(Error::KeyNotProvisioned.code() >> 8, 0x0A);
        assert_eq!(Error::InternalError.code(), 0xFFFF);
    }

    #[test]
    fn test_image_errors_block_boot() {
        let blocking: Vec<Error> = ALL.iter().copied().filter(Error::is_image_error).collect();
        assert_eq!(
            blocking,
            [
                Error::ImageTooLarge,
                Error::ImageCorrupted,
                Error::ImageBlank,
                Error::InvalidVectorTable
            ]
        );
    }

    #[test]
    fn test_error_display() {
        for error in ALL {
            let display = format!("{error}");
            assert!(display.starts_with(&format!("[0x{:04X}]", error.code())));
            assert!(display.ends_with(error.description()));
            assert!(!error.description().is_empty());
        }
    }
}

mod config_tests {
    use q_common::config::{BootloaderConfig, FlashLayout};
    use q_common::constants::{
        APP_START, FLASH_PAGE_SIZE, KEY_PAGE_ADDRESS, MANUAL_UPDATE_HOLD_MS, PROTOCOL_VERSION,
    };
    use q_common::log::LogLevel;
    use q_common::Error;

    #[test]
    fn test_bootloader_config_defaults() {
        let config = BootloaderConfig::default();
        assert_eq!(config.layout, FlashLayout::STM32F103XE);
        assert_eq!(config.protocol.version, PROTOCOL_VERSION);
        assert_eq!(config.manual_update.hold_ms, MANUAL_UPDATE_HOLD_MS);
        assert!(config.manual_update.require_external_power);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_with_layout_keeps_other_defaults() {
        let layout = FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0800_0800,
            flash_end: 0x0800_2000,
        };
        let config = BootloaderConfig::with_layout(layout);
        assert_eq!(config.layout, layout);
        assert_eq!(config.manual_update.hold_ms, 1000);
        assert_eq!(config.layout.max_app_size(), 0x17F8);
    }

    #[test]
    fn test_key_page_below_application() {
        assert_eq!(KEY_PAGE_ADDRESS + FLASH_PAGE_SIZE, APP_START);
        assert!(!FlashLayout::STM32F103XE.contains_image_range(KEY_PAGE_ADDRESS, 16));
    }

    #[test]
    fn test_config_validation() {
        let page = FLASH_PAGE_SIZE;
        assert!(FlashLayout::STM32F103XE.validate(page).is_ok());

        let inverted = FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0800_4000,
            flash_end: 0x0800_4000,
        };
        assert_eq!(inverted.validate(page), Err(Error::InvalidBootConfig));

        let below_flash = FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0700_0000,
            flash_end: 0x0800_4000,
        };
        assert_eq!(below_flash.validate(page), Err(Error::InvalidBootConfig));

        assert_eq!(
            FlashLayout::STM32F103XE.validate(0),
            Err(Error::InvalidBootConfig)
        );
    }

    #[test]
    fn test_image_range_edges() {
        let layout = FlashLayout::STM32F103XE;
        let max = layout.max_app_size();
        assert!(layout.contains_image_range(layout.app_start, max));
        assert!(!layout.contains_image_range(layout.app_start, max + 1));
        assert!(!layout.contains_image_range(u32::MAX - 4, 16));
    }
}

mod time_tests {
    use q_common::time::{Deadline, TickFrequency, Ticks};

    #[test]
    fn test_deadline_after_millis() {
        let start = Ticks::new(250);
        let deadline = Deadline::after_millis(start, 1000, TickFrequency::KHZ_1);

        assert!(!deadline.is_expired(Ticks::new(1249)));
        assert!(deadline.is_expired(Ticks::new(1250)));
        assert_eq!(deadline.remaining(Ticks::new(750)), 500);
        assert_eq!(deadline.remaining(Ticks::new(5000)), 0);
    }

    #[test]
    fn test_frequency_conversion() {
        let freq = TickFrequency::from_hz(32_768);
        assert_eq!(freq.millis_to_ticks(1000), 32_768);
        assert_eq!(freq.ticks_to_millis(32_768), 1000);
        assert_eq!(TickFrequency::KHZ_1.millis_to_ticks(7), 7);
    }

    #[test]
    fn test_tick_arithmetic_saturates() {
        let start = Ticks::new(u64::MAX - 1);
        let now = start + 3;
        assert_eq!(now.as_u64(), u64::MAX);
        assert_eq!(start.elapsed(now), 1);
        // A clock that went backwards reads as no time passed
        assert_eq!(now.elapsed(start), 0);
        assert!(!now.has_elapsed(start, 1));
    }
}

mod log_tests {
    use q_common::log::{LogBuffer, LogLevel};
    use q_common::{log_debug, log_error, log_info, log_warn};

    #[test]
    fn test_level_filter_and_wraparound() {
        let mut log: LogBuffer<4> = LogBuffer::with_level(LogLevel::Info);
        log_debug!(log, 0, "boot", "hidden");
        for i in 0..6 {
            log_info!(log, i, "boot", "attempt {}", i);
        }

        assert_eq!(log.len(), 4);
        assert_eq!(log.dropped(), 2);
        let stamps: Vec<u64> = log.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, [2, 3, 4, 5]);
        assert_eq!(log.last().unwrap().message.as_str(), "attempt 5");
    }

    #[test]
    fn test_count_at_least() {
        let mut log: LogBuffer = LogBuffer::with_level(LogLevel::Trace);
        log_error!(log, 1, "boot", "erase: {}", q_common::Error::FlashError);
        log_warn!(log, 2, "dispatch", "reply");
        log_info!(log, 3, "boot", "jump");

        assert_eq!(log.count_at_least(LogLevel::Error), 1);
        assert_eq!(log.count_at_least(LogLevel::Warn), 2);
        assert_eq!(log.count_at_least(LogLevel::Trace), 3);
    }

    #[test]
    fn test_drain_formats_entries() {
        let mut log: LogBuffer<8> = LogBuffer::new();
        log_warn!(log, 42, "integrity", "image {}", "crc mismatch");

        let mut out = String::new();
        log.drain_to(&mut out).unwrap();
        assert_eq!(out, "[0000000042] W [integrity] image crc mismatch\n");
        assert!(log.is_empty());
    }
}

mod constants_tests {
    use q_common::constants::*;

    #[test]
    fn test_wire_constants() {
        assert_eq!(WRITE_FINAL_MIN_LEN, 25);
        assert_eq!(
            [
                OP_GET_VERSION,
                OP_WRITE_MEMORY,
                OP_WRITE_FINAL,
                OP_RESET_POINTER,
                OP_GET_POINTER
            ],
            [0, 1, 2, 3, 4]
        );
        assert!(MAX_REPLY_SIZE >= 5);
        assert!(MAX_FRAME_SIZE > WRITE_FINAL_MIN_LEN);
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(APP_START, 0x0800_4000);
        assert_eq!(FLASH_END - TRAILER_SIZE, 0x0807_FFF8);
        assert_eq!(APP_START % FLASH_PAGE_SIZE, 0);
        assert_ne!(CRC_SENTINEL_ERASED, CRC_SENTINEL_ZERO);
    }
}
