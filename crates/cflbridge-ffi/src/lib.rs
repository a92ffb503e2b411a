// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cflbridge C ABI
//!
//! Boundary between a host runtime (JNI glue, Python ctypes, C) and the
//! registry/bridge core.
//!
//! ## Contract
//!
//! - Every export takes the opaque context from [`exports::cflbridge_init`]
//!   and a [`SuccessFlag`]. The flag's callback fires only on success; an
//!   unset flag is the sole failure signal.
//! - A null or callback-less flag aborts the call before any side effect.
//! - Borrowed foreign values arrive as [`ForeignSlice`]s and are released
//!   exactly once on every path.
//! - No panic unwinds across the boundary.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod context;
pub mod exports;
pub mod marshal;
pub mod sink;

pub use context::BridgeContext;
pub use marshal::{widen_dims, ForeignSlice, ForeignView, Pinned};
pub use sink::{ForeignSuccessFlag, ResultSink, SuccessFlag};

use cflbridge_bridge::BridgeError;
use cflbridge_config::ConfigError;
use cflbridge_registry::RegistryError;

/// Boundary error types. None of these cross the C ABI; they are logged and
/// collapsed to "flag not set".
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    #[error("Result sink could not be resolved: {0}")]
    UnresolvedSink(&'static str),

    #[error("Argument '{0}' could not be resolved")]
    UnresolvedArgument(&'static str),

    #[error("Argument '{name}' is not valid UTF-8")]
    InvalidUtf8 { name: &'static str },

    #[error("Negative extent {value} at dimension {index}")]
    NegativeExtent { index: usize, value: i32 },

    #[error("Extent {value} at dimension {index} does not fit the caller's integer width")]
    ExtentTooLarge { index: usize, value: usize },

    #[error("Output array holds {capacity} slots, {rank} needed")]
    OutputTooSmall { capacity: usize, rank: usize },

    #[error("Buffer holds {actual} bytes, {expected} required")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("Buffer at {address:#x} is not aligned to {align} bytes")]
    MisalignedBuffer { address: usize, align: usize },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, BoundaryError>;
