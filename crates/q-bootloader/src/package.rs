// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Host-side update frames
//!
//! Turns a packed ciphertext into the frame sequence a loader sends: a run
//! of `WriteMemory` frames holding whole blocks, then one `WriteFinal`
//! frame with the last block, the plaintext CRC and the plaintext size.

use heapless::Vec;
use q_common::constants::{AES_BLOCK_SIZE, MAX_FRAME_SIZE, OP_WRITE_FINAL, OP_WRITE_MEMORY};
use q_common::{Error, Result};

/// One transport frame
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// Encrypted image ready to send
#[derive(Debug, Clone, Copy)]
pub struct UpdatePackage<'a> {
    ciphertext: &'a [u8],
    crc32: u32,
    size: u32,
    max_frame: usize,
}

impl<'a> UpdatePackage<'a> {
    /// Wrap `ciphertext` with the CRC and size of the plaintext it encrypts
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCiphertext`] unless the ciphertext is a
    /// non-empty multiple of the block size.
    pub fn new(ciphertext: &'a [u8], crc32: u32, size: u32) -> Result<Self> {
        if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::InvalidCiphertext);
        }
        Ok(Self {
            ciphertext,
            crc32,
            size,
            max_frame: MAX_FRAME_SIZE,
        })
    }

    /// Limit frames to `max_frame` bytes including the opcode
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if a `WriteFinal` frame would not
    /// fit.
    pub fn with_max_frame(mut self, max_frame: usize) -> Result<Self> {
        if !(1 + AES_BLOCK_SIZE + 8..=MAX_FRAME_SIZE).contains(&max_frame) {
            return Err(Error::InvalidParameter);
        }
        self.max_frame = max_frame;
        Ok(self)
    }

    /// Blocks carried by each `WriteMemory` frame
    #[must_use]
    pub const fn blocks_per_frame(&self) -> usize {
        (self.max_frame - 1) / AES_BLOCK_SIZE
    }

    /// Number of frames, `WriteFinal` included
    #[must_use]
    pub fn frame_count(&self) -> usize {
        let body = self.ciphertext.len() / AES_BLOCK_SIZE - 1;
        body.div_ceil(self.blocks_per_frame()) + 1
    }

    /// Frames in send order
    #[must_use]
    pub fn frames(&self) -> Frames<'a> {
        let split = self.ciphertext.len() - AES_BLOCK_SIZE;
        let (body, last) = self.ciphertext.split_at(split);
        Frames {
            body,
            last: Some(last),
            chunk: self.blocks_per_frame() * AES_BLOCK_SIZE,
            crc32: self.crc32,
            size: self.size,
        }
    }
}

/// Iterator over the frames of an [`UpdatePackage`]
#[derive(Debug)]
pub struct Frames<'a> {
    body: &'a [u8],
    last: Option<&'a [u8]>,
    chunk: usize,
    crc32: u32,
    size: u32,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        let mut frame = Frame::new();

        if !self.body.is_empty() {
            let (head, rest) = self.body.split_at(self.chunk.min(self.body.len()));
            self.body = rest;
            // Capacity was checked when the package was built
            let _ = frame.push(OP_WRITE_MEMORY);
            let _ = frame.extend_from_slice(head);
            return Some(frame);
        }

        let last = self.last.take()?;
        let _ = frame.push(OP_WRITE_FINAL);
        let _ = frame.extend_from_slice(last);
        let _ = frame.extend_from_slice(&self.crc32.to_le_bytes());
        let _ = frame.extend_from_slice(&self.size.to_le_bytes());
        Some(frame)
    }
}
