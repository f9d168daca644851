// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Qbitel Field-Update Bootloader Common Library
//!
//! This crate provides the error definitions, configuration structures,
//! constants, time helpers and logging shared by the bootloader, its HAL
//! and its cipher crate.
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting of errors for embedded debugging
//!
//! # Memory
//!
//! No heap allocations are performed - all buffers use fixed-size arrays or
//! heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod errors;
pub mod config;
pub mod log;
pub mod constants;
pub mod time;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use config::{BootloaderConfig, FlashLayout};
pub use time::{Deadline, Ticks};
