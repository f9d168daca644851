// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Field-Update Bootloader Entry Point
//!
//! This is the first code that runs on device power-on.
//!
//! # Boot Flow
//!
//! 1. Read and clear the update request left by the application
//! 2. Check the flash layout and run the cipher self test
//! 3. Hand over to the orchestrator, which updates if asked or if the
//!    resident image is invalid, then jumps to the application
//!
//! If the layout or the cipher cannot be trusted, updates are refused: a
//! valid resident image still runs, otherwise the device keeps listening
//! and answering queries. A panic resets the device, so the next boot tries
//! again.
//!
//! # Board
//!
//! | Signal | Pin | Level |
//! |---|---|---|
//! | Update button | PA0 | low when pressed |
//! | External power sense | PB0 | high when present |
//! | Status LED | PC13 | low when lit |
//! | Host link | USART1 PA9/PA10 | 115200 8N1 |

#![no_std]
#![no_main]

use q_bootloader::{Board, BootOrchestrator, CortexMJumper, FlashKeyStore};
use q_common::config::BootloaderConfig;
use q_common::constants::{LOG_MODULE_BOOT, LOG_MODULE_CRYPTO};
use q_common::{log_error, log_info, Error};
use q_hal::framing::FramedTransport;
use q_hal::housekeeping::Housekeeping;
use q_hal::panel::{GpioPanel, PanelPin, Polarity};
use q_hal::stm32f1::gpio::{GpioPort, PinMode, Stm32f1GpioPin};
use q_hal::stm32f1::{
    system_reset, BackupMailbox, ClockConfig, Stm32f1Flash, Stm32f1Iwdg, Stm32f1Usart,
    SysTickClock,
};
use q_hal::{Clock, FlashInterface, Platform};

/// Host link baud rate
const HOST_BAUD_RATE: u32 = 115_200;

/// Watchdog period while an update is running
const WATCHDOG_TIMEOUT_MS: u32 = 2_000;

fn pin(port: GpioPort, index: u8, mode: PinMode) -> Stm32f1GpioPin {
    let mut pin = Stm32f1GpioPin::new(port, index);
    pin.configure(mode);
    pin
}

/// Bootloader entry point
#[no_mangle]
pub extern "C" fn _start() -> ! {
    let clocks = ClockConfig::HSI_8MHZ;
    let config = BootloaderConfig::DEFAULT;

    // 1. The request register is cleared before anything can fail
    let user_requested = BackupMailbox::open().take_update_request();

    let board = Board {
        flash: Stm32f1Flash::new(),
        transport: FramedTransport::new(Stm32f1Usart::new(clocks.pclk2_hz), HOST_BAUD_RATE),
        scheduler: Housekeeping::new(Stm32f1Iwdg::new(), WATCHDOG_TIMEOUT_MS),
        clock: SysTickClock::new(clocks.sysclk_hz),
        ui: GpioPanel::new(
            PanelPin::new(pin(GpioPort::PortA, 0, PinMode::InputPullUp), Polarity::ActiveLow),
            PanelPin::new(pin(GpioPort::PortB, 0, PinMode::InputPullDown), Polarity::ActiveHigh),
            PanelPin::new(pin(GpioPort::PortC, 13, PinMode::OutputPushPull), Polarity::ActiveLow),
        ),
        jumper: CortexMJumper,
        keys: FlashKeyStore::DEFAULT,
    };
    let mut orchestrator = BootOrchestrator::new(board, config);

    // 2. A broken layout or cipher must never program flash
    let platform = Platform::current();
    let layout = config.layout;
    let checked = layout.validate(Stm32f1Flash::PAGE_SIZE as u32).and_then(|()| {
        if layout.flash_base == platform.flash_base() {
            Ok(())
        } else {
            Err(Error::InvalidBootConfig)
        }
    });
    if let Err(e) = checked {
        log_error!(orchestrator.log_mut(), 0, LOG_MODULE_BOOT, "layout: {}", e);
        orchestrator.refuse_updates();
    }

    let now = orchestrator.board().clock.ticks();
    match q_crypto::self_test().into_result() {
        Ok(()) => log_info!(
            orchestrator.log_mut(),
            now,
            LOG_MODULE_CRYPTO,
            "self test passed on {}",
            platform.name()
        ),
        Err(e) => {
            log_error!(orchestrator.log_mut(), now, LOG_MODULE_CRYPTO, "{}", e);
            if orchestrator.check_image() {
                orchestrator.jump_to_application();
            }
            orchestrator.refuse_updates();
        }
    }

    // 3. Never returns
    orchestrator.exec(user_requested)
}

/// Panic handler
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    system_reset()
}
