// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cflbridge Command Bridge
//!
//! Runs textual commands against the external reconstruction engine:
//! - duplicates every token into a NUL-terminated `argv` owned by the bridge
//! - optionally supplies a bounded transcript buffer for the engine's report
//! - releases all of it on every exit path
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use cflbridge_bridge::{ArgumentVector, CommandBridge, CommandEngine, Transcript};
//!
//! struct Echo;
//!
//! impl CommandEngine for Echo {
//!     fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32 {
//!         if let Some(out) = transcript {
//!             out.push_str(&argv.to_strings().join(" "));
//!         }
//!         0
//!     }
//! }
//!
//! let bridge = CommandBridge::new(Arc::new(Echo), 4096);
//! let outcome = bridge.run_capturing_output(&["version", "-V"], 64)?;
//! assert!(outcome.is_success());
//! assert_eq!(outcome.transcript.as_deref(), Some("version -V"));
//! # Ok::<(), cflbridge_bridge::BridgeError>(())
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod argv;
pub mod bridge;
pub mod engine;
#[cfg(feature = "native-engine")]
pub mod native;
pub mod transcript;

pub use argv::ArgumentVector;
pub use bridge::{CommandBridge, CommandOutcome};
pub use engine::{
    CEngine, CommandEngine, EngineEntryPoint, UnavailableEngine, ENGINE_UNAVAILABLE_STATUS,
};
#[cfg(feature = "native-engine")]
pub use native::NativeEngine;
pub use transcript::Transcript;

/// Bridge error types
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Token {index} contains an interior NUL byte")]
    InvalidToken { index: usize },

    #[error("Too many tokens for a C argument vector: {0}")]
    TooManyTokens(usize),

    #[error("Transcript capacity must be at least 1 byte")]
    InvalidCapacity,

    #[error("Failed to load engine library '{path}': {reason}")]
    LibraryLoad { path: String, reason: String },

    #[error("Engine symbol '{symbol}' not found in '{path}': {reason}")]
    SymbolNotFound {
        symbol: String,
        path: String,
        reason: String,
    },

    #[error("No engine library configured")]
    NoLibraryConfigured,
}

pub type Result<T> = std::result::Result<T, BridgeError>;
