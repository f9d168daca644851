// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Length-prefixed framing over a UART
//!
//! Wire format, both directions:
//!
//! ```text
//! +--------+------------------+
//! | len u8 | len payload bytes|
//! +--------+------------------+
//! ```
//!
//! A zero length byte is an empty frame and is skipped. A line error drops
//! the partially assembled frame.

use crate::error::{HalError, HalResult};
use crate::traits::{Transport, UartInterface};
use q_common::constants::MAX_FRAME_SIZE;

/// Upper bound on bytes consumed by one `receive` call, so the caller's
/// scheduler still runs under a continuous byte stream
const RECEIVE_BUDGET: usize = MAX_FRAME_SIZE + 1;

/// Incremental frame assembler
pub struct FrameAssembler {
    buffer: [u8; MAX_FRAME_SIZE],
    expected: Option<usize>,
    filled: usize,
}

impl FrameAssembler {
    /// Empty assembler
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; MAX_FRAME_SIZE],
            expected: None,
            filled: 0,
        }
    }

    /// Feed one byte; returns the frame length once a frame is complete
    pub fn push(&mut self, byte: u8) -> Option<usize> {
        match self.expected {
            None => {
                if byte != 0 {
                    self.expected = Some(usize::from(byte));
                    self.filled = 0;
                }
                None
            }
            Some(len) => {
                self.buffer[self.filled] = byte;
                self.filled += 1;
                if self.filled == len {
                    self.expected = None;
                    Some(len)
                } else {
                    None
                }
            }
        }
    }

    /// Payload of the frame most recently completed
    #[must_use]
    pub fn frame(&self, len: usize) -> &[u8] {
        &self.buffer[..len.min(self.filled)]
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.expected = None;
        self.filled = 0;
    }

    /// Whether a frame is partially assembled
    #[must_use]
    pub const fn is_mid_frame(&self) -> bool {
        self.expected.is_some()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Transport`] over a UART using length-prefixed frames
pub struct FramedTransport<U: UartInterface> {
    uart: U,
    baud_rate: u32,
    assembler: FrameAssembler,
    oversized: u32,
}

impl<U: UartInterface> FramedTransport<U> {
    /// Wrap a UART that `init` will bring up at `baud_rate`
    pub const fn new(uart: U, baud_rate: u32) -> Self {
        Self {
            uart,
            baud_rate,
            assembler: FrameAssembler::new(),
            oversized: 0,
        }
    }

    /// Frames discarded because the caller's buffer was too small
    #[must_use]
    pub const fn oversized(&self) -> u32 {
        self.oversized
    }

    /// Access the wrapped UART
    pub fn uart(&self) -> &U {
        &self.uart
    }

    /// Mutable access to the wrapped UART
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }
}

impl<U: UartInterface> Transport for FramedTransport<U> {
    fn init(&mut self) -> HalResult<()> {
        self.assembler.reset();
        self.uart.init(self.baud_rate)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Option<usize> {
        for _ in 0..RECEIVE_BUDGET {
            let byte = match self.uart.try_read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => return None,
                Err(_) => {
                    self.assembler.reset();
                    return None;
                }
            };

            if let Some(len) = self.assembler.push(byte) {
                if len > buffer.len() {
                    self.oversized = self.oversized.saturating_add(1);
                    continue;
                }
                buffer[..len].copy_from_slice(self.assembler.frame(len));
                return Some(len);
            }
        }
        None
    }

    fn write(&mut self, data: &[u8]) -> HalResult<()> {
        let len = u8::try_from(data.len()).map_err(|_| HalError::InvalidParameter)?;
        self.uart.write_byte(len)?;
        self.uart.write(data)?;
        self.uart.flush()
    }
}
