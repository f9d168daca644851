// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for q-hal
//!
//! Exercises the platform-agnostic layer against the simulation backend:
//! flash mode brackets, controller rules, framing and the board glue.
//! Register-level drivers cannot run on the host.

mod platform_tests {
    use q_hal::Platform;

    #[test]
    fn test_platform_names() {
        assert_eq!(Platform::Stm32F1.name(), "stm32f1");
        assert_eq!(Platform::Simulation.name(), "sim");
        assert_eq!(Platform::Unknown.flash_base(), 0);
        assert_eq!(Platform::Stm32F1.flash_base(), 0x0800_0000);
    }
}

mod error_conversion_tests {
    use q_common::Error;
    use q_hal::HalError;

    #[test]
    fn test_every_flash_fault_maps_to_flash_family() {
        for e in [
            HalError::FlashError,
            HalError::FlashEraseFailed,
            HalError::FlashWriteFailed,
            HalError::FlashTimeout,
        ] {
            assert!(e.is_flash_fault());
            assert_eq!(Error::from(e), Error::FlashError);
        }
    }

    #[test]
    fn test_codes_are_in_hal_range() {
        for e in [
            HalError::NotInitialized,
            HalError::FlashModeConflict,
            HalError::UartOverrun,
            HalError::NotSupported,
        ] {
            assert_eq!(e.code() & 0xFF00, 0x0800);
        }
    }

    #[test]
    fn test_display_format() {
        let text = format!("{}", HalError::FlashLocked);
        assert_eq!(text, "[0x0811] flash locked");
    }
}

mod flash_bracket_tests {
    use q_hal::sim::{SimFlash, SimFlashMode};
    use q_hal::{EraseBracket, FlashInterface, HalError, HalResult, ProgramBracket};

    type Flash = SimFlash<0x0800_0000, 8192, 2048>;

    fn unlocked() -> Flash {
        let mut flash = Flash::new();
        flash.init().unwrap();
        flash.unlock().unwrap();
        flash
    }

    #[test]
    fn test_program_then_read_u32() {
        let mut flash = unlocked();
        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        bracket.program(0x0800_0800, &[0x78, 0x56, 0x34, 0x12]).unwrap();
        bracket.finish().unwrap();

        assert_eq!(flash.read_u32(0x0800_0800).unwrap(), 0x1234_5678);
        assert_eq!(flash.program_count(), 2);
    }

    #[test]
    fn test_nested_brackets_conflict() {
        let mut flash = unlocked();
        flash.begin_programming().unwrap();
        assert_eq!(flash.begin_erasing(), Err(HalError::FlashModeConflict));
        flash.end_programming().unwrap();
        assert!(EraseBracket::open(&mut flash).is_ok());
    }

    #[test]
    fn test_error_inside_bracket_still_closes_mode() {
        let mut flash = unlocked();
        flash.fail_program_at(0x0800_0004);

        fn write_zeros(flash: &mut Flash) -> HalResult<()> {
            let mut bracket = ProgramBracket::open(flash)?;
            bracket.program(0x0800_0000, &[0u8; 8])?;
            bracket.finish()
        }

        let result = write_zeros(&mut flash);

        assert_eq!(result, Err(HalError::FlashWriteFailed));
        assert_eq!(flash.mode(), SimFlashMode::Idle);
        // Half-words before the fault landed
        assert_eq!(flash.slice(0x0800_0000, 6).unwrap(), &[0, 0, 0, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn test_misaligned_program_rejected() {
        let mut flash = unlocked();
        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        assert_eq!(bracket.program(0x0800_0001, &[1, 2]), Err(HalError::FlashMisaligned));
        assert_eq!(
            bracket.program_half_word(0x0800_0003, 0),
            Err(HalError::FlashMisaligned)
        );
    }

    #[test]
    fn test_erase_range_restores_programmability() {
        let mut flash = unlocked();
        {
            let mut bracket = ProgramBracket::open(&mut flash).unwrap();
            bracket.program_half_word(0x0800_1000, 0x1234).unwrap();
        }
        flash.erase_range(0x0800_1000, 0x0800_1800).unwrap();

        let mut bracket = ProgramBracket::open(&mut flash).unwrap();
        bracket.program_half_word(0x0800_1000, 0x4321).unwrap();
    }

    #[test]
    fn test_erase_hook_runs_after_every_page() {
        let mut flash = unlocked();
        let mut visited = Vec::new();
        flash
            .erase_range_each(0x0800_0000, 0x0800_2000, |page| visited.push(page))
            .unwrap();

        assert_eq!(visited, [0x0800_0000, 0x0800_0800, 0x0800_1000, 0x0800_1800]);
        assert_eq!(flash.erase_count(), 4);
    }

    #[test]
    fn test_erase_hook_not_run_for_failed_page() {
        let mut flash = unlocked();
        flash.fail_erase_at(0x0800_1000);
        let mut visited = Vec::new();
        let result = flash.erase_range_each(0x0800_0000, 0x0800_2000, |page| visited.push(page));

        assert_eq!(result, Err(HalError::FlashEraseFailed));
        assert_eq!(visited, [0x0800_0000, 0x0800_0800]);
        assert_eq!(flash.mode(), SimFlashMode::Idle);
    }

    #[test]
    fn test_reads_are_counted() {
        let flash = unlocked();
        let mut word = [0u8; 4];
        flash.read(0x0800_0000, &mut word).unwrap();
        flash.read_u32(0x0800_0004).unwrap();
        assert_eq!(flash.read_count(), 2);

        flash.reset_read_count();
        assert_eq!(flash.read_count(), 0);
    }

    #[test]
    fn test_lock_blocks_everything() {
        let mut flash = unlocked();
        flash.lock().unwrap();
        assert!(flash.is_locked());
        assert_eq!(flash.erase_range(0x0800_0000, 0x0800_0800), Err(HalError::FlashLocked));
    }
}

mod board_glue_tests {
    use q_hal::framing::FramedTransport;
    use q_hal::housekeeping::Housekeeping;
    use q_hal::panel::{GpioPanel, PanelPin, Polarity};
    use q_hal::sim::{SimPin, SimUart, SimWatchdog};
    use q_hal::{Scheduler, Transport, UserInterface};

    #[test]
    fn test_panel_tracks_shared_pins() {
        let button = SimPin::new(true);
        let power = SimPin::new(false);
        let led = SimPin::new(false);
        let mut panel = GpioPanel::new(
            PanelPin::new(&button, Polarity::ActiveLow),
            PanelPin::new(&power, Polarity::ActiveHigh),
            PanelPin::new(&led, Polarity::ActiveHigh),
        );

        assert!(!panel.is_button_pressed());
        button.set_level(false);
        assert!(panel.is_button_pressed());

        power.set_level(true);
        assert!(panel.has_external_power());

        panel.set_indicator(true);
        assert!(led.level());
    }

    #[test]
    fn test_transport_and_scheduler_together() {
        let mut uart = SimUart::new();
        uart.inject(&[1, 0x00]);
        let mut transport = FramedTransport::new(uart, 115_200);
        let mut sched = Housekeeping::new(SimWatchdog::new(), 1000);

        sched.init().unwrap();
        transport.init().unwrap();

        let mut frame = [0u8; 32];
        let mut received = None;
        for _ in 0..4 {
            sched.work();
            if let Some(n) = transport.receive(&mut frame) {
                received = Some(n);
                break;
            }
        }

        assert_eq!(received, Some(1));
        assert_eq!(sched.watchdog().feeds(), 1);
        assert_eq!(transport.uart().baud_rate(), Some(115_200));
    }
}
