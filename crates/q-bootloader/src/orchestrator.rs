// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Boot decision and update loop
//!
//! # Boot Flow
//!
//! 1. If the application asked for an update, or the operator holds the
//!    button on external power for the hold window, run one update attempt
//! 2. While the resident image fails its integrity check, run another
//!    attempt (there is no limit; an invalid image is never executed)
//! 3. Switch the indicator off if any attempt ran
//! 4. Jump to the application
//!
//! An attempt erases the whole application region, then feeds transport
//! frames to the [`CommandDispatcher`] until `WriteFinal` ends the session.
//! Whether it worked is decided only by the next integrity check.
//!
//! # Watchdog
//!
//! The scheduler (on the device, the watchdog) is initialised only when the
//! first attempt starts, and is pumped after every erased page and every
//! transport poll. A boot with no attempt hands over with the watchdog
//! unarmed. After an attempt the application inherits it running, because
//! the IWDG cannot be stopped once started, and must keep feeding it.
//!
//! # Boot log
//!
//! Entries go to an in-RAM [`LogBuffer`] for host-side runs and debugger
//! inspection. The host link carries only protocol frames, so the device
//! never transmits the log.

use crate::dispatcher::{CommandDispatcher, Reply};
use crate::integrity::{self, Verdict};
use crate::jump::VectorTable;
use crate::keys::KeyStore;
use crate::session::UpdateSession;
use core::fmt;
use q_common::config::BootloaderConfig;
use q_common::constants::{LOG_MODULE_BOOT, LOG_MODULE_DISPATCH, LOG_MODULE_INTEGRITY, MAX_FRAME_SIZE};
use q_common::log::LogBuffer;
use q_common::time::Deadline;
use q_common::{log_debug, log_error, log_info, log_trace, log_warn};
use q_hal::{Clock, FlashInterface, Jumper, Scheduler, Transport, UserInterface};

/// Everything the orchestrator drives
pub struct Board<F, T, S, C, U, J, K> {
    /// Code flash holding the application region
    pub flash: F,
    /// Frame transport to the update host
    pub transport: T,
    /// Background work pumped while waiting for frames
    pub scheduler: S,
    /// Monotonic clock
    pub clock: C,
    /// Button, power sense and indicator
    pub ui: U,
    /// Application handoff
    pub jumper: J,
    /// Firmware key source
    pub keys: K,
}

/// Boot orchestrator
pub struct BootOrchestrator<F, T, S, C, U, J, K> {
    board: Board<F, T, S, C, U, J, K>,
    config: BootloaderConfig,
    dispatcher: CommandDispatcher,
    link_up: bool,
    initialized: bool,
    attempts: u32,
    frame: [u8; MAX_FRAME_SIZE],
    log: LogBuffer,
}

impl<F, T, S, C, U, J, K> BootOrchestrator<F, T, S, C, U, J, K>
where
    F: FlashInterface,
    T: Transport,
    S: Scheduler,
    C: Clock,
    U: UserInterface,
    J: Jumper,
    K: KeyStore,
{
    /// Create an orchestrator; no hardware is touched until it runs
    pub fn new(board: Board<F, T, S, C, U, J, K>, config: BootloaderConfig) -> Self {
        Self {
            board,
            dispatcher: CommandDispatcher::new(&config),
            link_up: false,
            initialized: false,
            attempts: 0,
            frame: [0u8; MAX_FRAME_SIZE],
            log: LogBuffer::with_level(config.log_level),
            config,
        }
    }

    /// Run the boot flow and hand off to the application
    pub fn exec(mut self, user_requested: bool) -> ! {
        self.run_updates(user_requested);
        self.jump_to_application()
    }

    /// Steps 1 to 3 of the boot flow; returns the number of attempts run
    ///
    /// Returns only once the resident image is valid.
    pub fn run_updates(&mut self, user_requested: bool) -> u32 {
        if let Err(e) = self.board.clock.init() {
            log_warn!(self.log, 0, LOG_MODULE_BOOT, "clock init: {}", e);
        }

        let before = self.attempts;
        if user_requested || self.manual_update_requested() {
            log_info!(
                self.log,
                self.board.clock.ticks(),
                LOG_MODULE_BOOT,
                "update requested ({})",
                if user_requested { "application" } else { "button" }
            );
            self.load();
        }

        while !self.check_image() {
            self.load();
        }

        let ran = self.attempts - before;
        if ran > 0 {
            self.board.ui.set_indicator(false);
        }
        ran
    }

    /// Whether the operator is asking for an update
    ///
    /// True only if external power is present and the button stays pressed
    /// for the whole hold window. Releasing it early gives `false` at once.
    pub fn manual_update_requested(&self) -> bool {
        let ui = &self.board.ui;
        let gesture = &self.config.manual_update;

        if gesture.require_external_power && !ui.has_external_power() {
            return false;
        }
        if !ui.is_button_pressed() {
            return false;
        }

        let clock = &self.board.clock;
        let deadline = Deadline::after_millis(clock.now(), gesture.hold_ms, clock.frequency());
        loop {
            if !ui.is_button_pressed() {
                return false;
            }
            if deadline.is_expired(clock.now()) {
                return true;
            }
        }
    }

    /// Run one update attempt
    pub fn load(&mut self) {
        if !self.initialized {
            self.bring_up();
        }

        self.attempts = self.attempts.saturating_add(1);
        let layout = self.config.layout;
        log_info!(
            self.log,
            self.board.clock.ticks(),
            LOG_MODULE_BOOT,
            "attempt {}: erasing {:#010x}..{:#010x}",
            self.attempts,
            layout.app_start,
            layout.flash_end
        );

        // Each page blocks for tens of milliseconds
        let scheduler = &mut self.board.scheduler;
        let erased =
            self.board
                .flash
                .erase_range_each(layout.app_start, layout.flash_end, |_| scheduler.work());
        if let Err(e) = erased {
            log_error!(self.log, self.board.clock.ticks(), LOG_MODULE_BOOT, "erase: {}", e);
            return;
        }

        let mut session = match self.board.keys.firmware_key(&self.board.flash) {
            Ok(key) => UpdateSession::new(&key, &layout),
            Err(e) => {
                log_error!(self.log, self.board.clock.ticks(), LOG_MODULE_BOOT, "key: {}", e);
                return;
            }
        };

        while session.in_progress() {
            self.board.scheduler.work();

            let Some(len) = self.board.transport.receive(&mut self.frame) else {
                continue;
            };

            let result =
                self.dispatcher
                    .dispatch(&mut session, &mut self.board.flash, &self.frame[..len]);
            match result {
                Ok(Some(reply)) => self.send(&reply),
                Ok(None) => {
                    log_trace!(
                        self.log,
                        self.board.clock.ticks(),
                        LOG_MODULE_DISPATCH,
                        "op {} ptr {:#010x}",
                        self.frame[0],
                        session.address_pointer()
                    );
                }
                Err(e) => {
                    log_debug!(self.log, self.board.clock.ticks(), LOG_MODULE_DISPATCH, "dropped: {}", e);
                }
            }
        }

        log_info!(
            self.log,
            self.board.clock.ticks(),
            LOG_MODULE_BOOT,
            "attempt {} ended at {:#010x}",
            self.attempts,
            session.address_pointer()
        );
    }

    /// Check the resident image, logging the verdict
    pub fn check_image(&mut self) -> bool {
        let verdict = integrity::check(&self.board.flash, &self.config.layout);
        log_debug!(
            self.log,
            self.board.clock.ticks(),
            LOG_MODULE_INTEGRITY,
            "image {}",
            verdict.as_str()
        );
        verdict == Verdict::Valid
    }

    /// Lock flash and enter the application
    pub fn jump_to_application(mut self) -> ! {
        let start = self.config.layout.app_start;
        let now = self.board.clock.ticks();

        match VectorTable::read(&self.board.flash, start)
            .and_then(|table| table.validate(&self.config.layout).map(|()| table))
        {
            Ok(table) => log_info!(
                self.log,
                now,
                LOG_MODULE_BOOT,
                "jump {:#010x} sp {:#010x} entry {:#010x}",
                start,
                table.initial_sp,
                table.reset_vector
            ),
            Err(e) => log_warn!(self.log, now, LOG_MODULE_BOOT, "jump {:#010x}: {}", start, e),
        }

        if self.initialized {
            if let Err(e) = self.board.flash.lock() {
                log_warn!(self.log, now, LOG_MODULE_BOOT, "flash lock: {}", e);
            }
        }

        self.board.jumper.jump(start)
    }

    /// Stay reachable without ever writing flash
    ///
    /// For a device that must not update (the cipher failed its self test)
    /// and has no valid image to run. The watchdog is kept fed and queries
    /// are answered; every write is dropped. Never returns.
    pub fn refuse_updates(mut self) -> ! {
        log_warn!(
            self.log,
            self.board.clock.ticks(),
            LOG_MODULE_BOOT,
            "updates refused, listening"
        );
        loop {
            self.serve_refusing();
        }
    }

    /// One round of [`refuse_updates`](Self::refuse_updates)
    pub fn serve_refusing(&mut self) {
        self.bring_up_link();
        self.board.scheduler.work();

        let Some(len) = self.board.transport.receive(&mut self.frame) else {
            return;
        };
        match self.dispatcher.dispatch_refusing(&self.frame[..len]) {
            Ok(Some(reply)) => self.send(&reply),
            Ok(None) => {}
            Err(e) => {
                log_debug!(self.log, self.board.clock.ticks(), LOG_MODULE_DISPATCH, "refused: {}", e);
            }
        }
    }

    fn send(&mut self, reply: &Reply) {
        if let Err(e) = self.board.transport.write(reply.as_bytes()) {
            log_warn!(self.log, self.board.clock.ticks(), LOG_MODULE_DISPATCH, "reply: {}", e);
        }
    }

    fn bring_up(&mut self) {
        self.bring_up_link();
        if let Err(e) = self.board.flash.init().and_then(|()| self.board.flash.unlock()) {
            log_error!(self.log, self.board.clock.ticks(), LOG_MODULE_BOOT, "flash unlock: {}", e);
        }
        self.initialized = true;
    }

    fn bring_up_link(&mut self) {
        if self.link_up {
            return;
        }
        self.link_up = true;

        let now = self.board.clock.ticks();
        if let Err(e) = self.board.scheduler.init() {
            log_warn!(self.log, now, LOG_MODULE_BOOT, "scheduler init: {}", e);
        }
        if let Err(e) = self.board.transport.init() {
            log_error!(self.log, now, LOG_MODULE_BOOT, "transport init: {}", e);
        }
        self.board.ui.set_indicator(true);
    }

    /// Number of attempts run so far
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Boot log
    #[must_use]
    pub const fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Boot log, for entries recorded outside the boot flow
    pub fn log_mut(&mut self) -> &mut LogBuffer {
        &mut self.log
    }

    /// Write out and clear the boot log
    ///
    /// # Errors
    ///
    /// Propagates the sink's formatting error.
    pub fn drain_log<W: fmt::Write>(&mut self, sink: &mut W) -> fmt::Result {
        self.log.drain_to(sink)
    }

    /// The driven collaborators
    pub fn board(&self) -> &Board<F, T, S, C, U, J, K> {
        &self.board
    }

    /// Mutable access to the driven collaborators
    pub fn board_mut(&mut self) -> &mut Board<F, T, S, C, U, J, K> {
        &mut self.board
    }
}
