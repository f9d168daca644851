// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! GPIO-backed user panel
//!
//! Composes three pins into the [`UserInterface`] the boot logic reads:
//! the update button, the external-power sense line and the status LED.
//! Each pin carries its own polarity since boards differ.

use crate::traits::{GpioPin, UserInterface};

/// Electrical level that means "asserted"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// High level is asserted
    ActiveHigh,
    /// Low level is asserted
    ActiveLow,
}

impl Polarity {
    const fn asserted(self, high: bool) -> bool {
        match self {
            Self::ActiveHigh => high,
            Self::ActiveLow => !high,
        }
    }
}

/// A pin together with its polarity
pub struct PanelPin<P: GpioPin> {
    pin: P,
    polarity: Polarity,
}

impl<P: GpioPin> PanelPin<P> {
    /// Wrap a pin
    pub const fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Whether the pin currently reads as asserted
    ///
    /// A read failure counts as not asserted.
    pub fn is_asserted(&self) -> bool {
        self.pin
            .is_high()
            .map(|high| self.polarity.asserted(high))
            .unwrap_or(false)
    }

    /// Drive the pin to the asserted or released level
    pub fn drive(&mut self, asserted: bool) {
        let high = self.polarity.asserted(asserted);
        // An LED that will not switch is not worth aborting an update over
        let _ = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }

    /// Access the underlying pin
    pub fn inner(&self) -> &P {
        &self.pin
    }
}

/// Button, power sense and indicator pins
pub struct GpioPanel<B: GpioPin, S: GpioPin, L: GpioPin> {
    button: PanelPin<B>,
    power_sense: PanelPin<S>,
    indicator: PanelPin<L>,
}

impl<B: GpioPin, S: GpioPin, L: GpioPin> GpioPanel<B, S, L> {
    /// Assemble a panel
    pub const fn new(button: PanelPin<B>, power_sense: PanelPin<S>, indicator: PanelPin<L>) -> Self {
        Self {
            button,
            power_sense,
            indicator,
        }
    }

    /// Indicator pin, for tests and diagnostics
    pub fn indicator(&self) -> &PanelPin<L> {
        &self.indicator
    }
}

impl<B: GpioPin, S: GpioPin, L: GpioPin> UserInterface for GpioPanel<B, S, L> {
    fn is_button_pressed(&self) -> bool {
        self.button.is_asserted()
    }

    fn has_external_power(&self) -> bool {
        self.power_sense.is_asserted()
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator.drive(on);
    }
}
