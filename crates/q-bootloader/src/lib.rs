// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Field-Update Bootloader Library
//!
//! This crate decides at every boot whether the resident application can be
//! trusted, and receives a replacement when it cannot:
//!
//! - **Integrity**: CRC check of the image against its flash trailer
//! - **Session**: Pointer and cipher state of one update attempt
//! - **Dispatcher**: The five-command update protocol
//! - **Orchestrator**: Boot decision, update loop and handoff
//! - **Jump**: Vector table checks and the Cortex-M handoff
//! - **Package**: Host-side frame builder for the update protocol

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::type_complexity)]

pub mod dispatcher;
pub mod integrity;
pub mod jump;
pub mod keys;
pub mod orchestrator;
pub mod package;
pub mod session;
pub mod trailer;

pub use dispatcher::{Command, CommandDispatcher, Reply};
pub use integrity::{is_valid, Verdict};
pub use jump::{CortexMJumper, VectorTable};
pub use keys::{FlashKeyStore, KeyStore, StaticKeyStore};
pub use orchestrator::{Board, BootOrchestrator};
pub use package::{Frame, UpdatePackage};
pub use session::UpdateSession;
pub use trailer::Trailer;
