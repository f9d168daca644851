// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Update command handling
//!
//! One command per frame; the first byte is the opcode.
//!
//! ```text
//! 0 GetVersion    -> [0, version]
//! 1 WriteMemory   n * 16 cipher bytes, trailing partial block ignored
//! 2 WriteFinal    16 cipher bytes | crc32 LE | size LE
//! 3 ResetPointer
//! 4 GetPointer    -> [4, pointer LE]
//! ```
//!
//! Anything that is not a well-formed command is dropped without a reply.

use crate::session::UpdateSession;
use crate::trailer::Trailer;
use q_common::config::{BootloaderConfig, FlashLayout};
use q_common::constants::{
    AES_BLOCK_SIZE, MAX_REPLY_SIZE, OP_GET_POINTER, OP_GET_VERSION, OP_RESET_POINTER,
    OP_WRITE_FINAL, OP_WRITE_MEMORY, WRITE_FINAL_MIN_LEN,
};
use q_common::{Error, Result};
use q_crypto::cfb::{final_payload_len, Block};
use q_hal::{FlashInterface, ProgramBracket};
use zeroize::Zeroize;

// ============================================================================
// Commands
// ============================================================================

/// Update protocol commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Report the protocol version
    GetVersion = OP_GET_VERSION,
    /// Decrypt and program whole blocks
    WriteMemory = OP_WRITE_MEMORY,
    /// Decrypt the padded final block and write the trailer
    WriteFinal = OP_WRITE_FINAL,
    /// Rewind the address pointer
    ResetPointer = OP_RESET_POINTER,
    /// Report the address pointer
    GetPointer = OP_GET_POINTER,
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            OP_GET_VERSION => Ok(Self::GetVersion),
            OP_WRITE_MEMORY => Ok(Self::WriteMemory),
            OP_WRITE_FINAL => Ok(Self::WriteFinal),
            OP_RESET_POINTER => Ok(Self::ResetPointer),
            OP_GET_POINTER => Ok(Self::GetPointer),
            _ => Err(Error::UnknownCommand),
        }
    }
}

/// Reply payload, built without allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    bytes: [u8; MAX_REPLY_SIZE],
    len: usize,
}

impl Reply {
    fn new(data: &[u8]) -> Self {
        let len = data.len().min(MAX_REPLY_SIZE);
        let mut bytes = [0u8; MAX_REPLY_SIZE];
        bytes[..len].copy_from_slice(&data[..len]);
        Self { bytes, len }
    }

    /// Bytes to send back
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Applies frames to an [`UpdateSession`]
#[derive(Debug, Clone, Copy)]
pub struct CommandDispatcher {
    version: u8,
    layout: FlashLayout,
}

impl CommandDispatcher {
    /// Dispatcher for the given configuration
    #[must_use]
    pub const fn new(config: &BootloaderConfig) -> Self {
        Self {
            version: config.protocol.version,
            layout: config.layout,
        }
    }

    /// Handle one frame
    ///
    /// `Ok(Some(reply))` must be written back to the host. `Err` means the
    /// frame was dropped or only partly applied; no reply is sent either way.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFrame`] for an empty or short frame
    /// - [`Error::UnknownCommand`] for an unknown opcode
    /// - [`Error::InvalidState`] for a write after the attempt ended
    /// - [`Error::ImageOverflow`] for a write that would reach the trailer
    /// - Flash errors from programming
    pub fn dispatch<F: FlashInterface>(
        &self,
        session: &mut UpdateSession,
        flash: &mut F,
        frame: &[u8],
    ) -> Result<Option<Reply>> {
        let (&opcode, payload) = frame.split_first().ok_or(Error::MalformedFrame)?;

        match Command::try_from(opcode)? {
            Command::GetVersion => Ok(Some(self.version_reply())),
            Command::WriteMemory => Self::write_memory(session, flash, payload).map(|()| None),
            Command::WriteFinal => self.write_final(session, flash, payload).map(|()| None),
            Command::ResetPointer => {
                session.reset_pointer();
                Ok(None)
            }
            Command::GetPointer => Ok(Some(Self::pointer_reply(session.address_pointer()))),
        }
    }

    /// Handle one frame while updates are refused
    ///
    /// Only the queries are answered. Nothing is ever written, so the
    /// pointer always reads as the application start.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedFrame`] for an empty frame
    /// - [`Error::UnknownCommand`] for an unknown opcode
    /// - [`Error::SelfTestFailed`] for every command that changes state
    pub fn dispatch_refusing(&self, frame: &[u8]) -> Result<Option<Reply>> {
        let &opcode = frame.first().ok_or(Error::MalformedFrame)?;

        match Command::try_from(opcode)? {
            Command::GetVersion => Ok(Some(self.version_reply())),
            Command::GetPointer => Ok(Some(Self::pointer_reply(self.layout.app_start))),
            Command::WriteMemory | Command::WriteFinal | Command::ResetPointer => {
                Err(Error::SelfTestFailed)
            }
        }
    }

    fn version_reply(&self) -> Reply {
        Reply::new(&[OP_GET_VERSION, self.version])
    }

    fn pointer_reply(pointer: u32) -> Reply {
        let p = pointer.to_le_bytes();
        Reply::new(&[OP_GET_POINTER, p[0], p[1], p[2], p[3]])
    }

    fn write_memory<F: FlashInterface>(
        session: &mut UpdateSession,
        flash: &mut F,
        payload: &[u8],
    ) -> Result<()> {
        if !session.in_progress() {
            return Err(Error::InvalidState);
        }

        let blocks = payload.chunks_exact(AES_BLOCK_SIZE);
        if blocks.len() == 0 {
            return Ok(());
        }

        let mut bracket = ProgramBracket::open(flash)?;
        for chunk in blocks {
            if !session.has_room(AES_BLOCK_SIZE as u32) {
                return Err(Error::ImageOverflow);
            }

            let mut block: Block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            session.decrypt_block(&mut block);
            let written = bracket.program(session.address_pointer(), &block);
            block.zeroize();
            written?;

            session.advance(AES_BLOCK_SIZE as u32);
        }
        bracket.finish()?;
        Ok(())
    }

    fn write_final<F: FlashInterface>(
        &self,
        session: &mut UpdateSession,
        flash: &mut F,
        payload: &[u8],
    ) -> Result<()> {
        if payload.len() + 1 < WRITE_FINAL_MIN_LEN {
            return Err(Error::MalformedFrame);
        }
        if !session.in_progress() {
            return Err(Error::InvalidState);
        }

        let mut block: Block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(&payload[..AES_BLOCK_SIZE]);
        let fields = &payload[AES_BLOCK_SIZE..];
        let trailer = Trailer {
            crc32: u32::from_le_bytes([fields[0], fields[1], fields[2], fields[3]]),
            size: u32::from_le_bytes([fields[4], fields[5], fields[6], fields[7]]),
        };

        session.decrypt_block(&mut block);
        let len = final_payload_len(&block);
        let result = self.program_final(session, flash, &block[..len], &trailer);
        block.zeroize();

        // A well-formed final frame ends the attempt whatever the flash did;
        // the integrity check decides whether it worked
        session.finish();
        result
    }

    fn program_final<F: FlashInterface>(
        &self,
        session: &mut UpdateSession,
        flash: &mut F,
        data: &[u8],
        trailer: &Trailer,
    ) -> Result<()> {
        let len = data.len() as u32;
        if !session.has_room(len + len % 2) {
            return Err(Error::ImageOverflow);
        }

        let mut bracket = ProgramBracket::open(flash)?;
        bracket.program(session.address_pointer(), data)?;
        session.advance(len);
        trailer.write(&mut bracket, &self.layout)?;
        bracket.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use q_crypto::FirmwareKey;
    use q_hal::sim::SimFlash;

    type Flash = SimFlash<0x0800_0000, 0x2000, 0x400>;

    fn setup() -> (CommandDispatcher, UpdateSession, Flash) {
        let layout = FlashLayout {
            flash_base: 0x0800_0000,
            app_start: 0x0800_0800,
            flash_end: 0x0800_2000,
        };
        let config = BootloaderConfig::with_layout(layout);
        let mut flash = Flash::new();
        flash.init().unwrap();
        flash.unlock().unwrap();
        (
            CommandDispatcher::new(&config),
            UpdateSession::new(&FirmwareKey::new([0x11; 16]), &layout),
            flash,
        )
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::try_from(2), Ok(Command::WriteFinal));
        assert_eq!(Command::try_from(5), Err(Error::UnknownCommand));
        assert_eq!(Command::GetPointer as u8, 4);
    }

    #[test]
    fn test_get_version() {
        let (dispatcher, mut session, mut flash) = setup();
        let reply = dispatcher.dispatch(&mut session, &mut flash, &[0]).unwrap();
        assert_eq!(reply.unwrap().as_bytes(), &[0, 1]);
    }

    #[test]
    fn test_get_pointer_on_fresh_session() {
        let (dispatcher, mut session, mut flash) = setup();
        let reply = dispatcher.dispatch(&mut session, &mut flash, &[4]).unwrap();
        assert_eq!(reply.unwrap().as_bytes(), &[4, 0x00, 0x08, 0x00, 0x08]);
    }

    #[test]
    fn test_junk_gets_no_reply() {
        let (dispatcher, mut session, mut flash) = setup();
        assert_eq!(
            dispatcher.dispatch(&mut session, &mut flash, &[]),
            Err(Error::MalformedFrame)
        );
        assert_eq!(
            dispatcher.dispatch(&mut session, &mut flash, &[0x7F, 1, 2]),
            Err(Error::UnknownCommand)
        );
        assert_eq!(
            dispatcher.dispatch(&mut session, &mut flash, &[2; 24]),
            Err(Error::MalformedFrame)
        );
        assert!(session.in_progress());
        assert_eq!(flash.program_count(), 0);
    }

    #[test]
    fn test_partial_block_dropped() {
        let (dispatcher, mut session, mut flash) = setup();
        let mut frame = [0u8; 1 + 16 + 5];
        frame[0] = 1;
        dispatcher.dispatch(&mut session, &mut flash, &frame).unwrap();
        assert_eq!(session.address_pointer(), 0x0800_0810);
        assert_eq!(flash.program_count(), 8);
    }

    #[test]
    fn test_write_final_ends_session_once() {
        let (dispatcher, mut session, mut flash) = setup();
        let mut frame = [0u8; 25];
        frame[0] = 2;
        // Whatever the block decrypts to, the session ends
        let _ = dispatcher.dispatch(&mut session, &mut flash, &frame);
        assert!(!session.in_progress());
        assert_eq!(
            dispatcher.dispatch(&mut session, &mut flash, &frame),
            Err(Error::InvalidState)
        );
    }

    #[test]
    fn test_refusing_answers_queries_only() {
        let (dispatcher, _, _) = setup();
        assert_eq!(dispatcher.dispatch_refusing(&[0]).unwrap().unwrap().as_bytes(), &[0, 1]);
        assert_eq!(
            dispatcher.dispatch_refusing(&[4]).unwrap().unwrap().as_bytes(),
            &[4, 0x00, 0x08, 0x00, 0x08]
        );
        for frame in [&[1u8; 17][..], &[2u8; 25][..], &[3u8][..]] {
            assert_eq!(dispatcher.dispatch_refusing(frame), Err(Error::SelfTestFailed));
        }
        assert_eq!(dispatcher.dispatch_refusing(&[]), Err(Error::MalformedFrame));
    }
}
