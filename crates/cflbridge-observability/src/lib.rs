// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cflbridge-observability
//!
//! Logging initialisation shared by every cflbridge crate, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files in a timestamped run folder (desktop only)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known cflbridge crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "cflbridge",
    "cflbridge-config",
    "cflbridge-registry",
    "cflbridge-bridge",
    "cflbridge-ffi",
];
