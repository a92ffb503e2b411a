// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cflbridge Registry
//!
//! Maps string names to complex-float arrays so the command engine can address
//! memory the way it addresses files.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Registry (one mutex)              │
//! │   ├── name → Arc<RegisteredBuffer>  │  ← Borrowed (caller memory) or Owned
//! │   └── ReservationTracker            │  ← advisory input/output roles
//! └─────────────────────────────────────┘
//!           ↓ load()
//! ┌─────────────────────────────────────┐
//! │   MemoryView                        │  ← resident entry, or a read-only
//! │                                     │    mapping of <fallback_dir>/<name>.cfl
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use cflbridge_registry::{ComplexF32, Dims, Registry};
//!
//! let registry = Registry::default();
//! registry.create_with("recon.mem", Dims::from([2, 2]), |data| {
//!     data.fill(ComplexF32::new(1.0, -1.0));
//! })?;
//!
//! let view = registry.load("recon.mem", &Dims::from([2, 2]))?;
//! assert_eq!(view.byte_size(), 4 * 8);
//! registry.unmap(view);
//! registry.unregister("recon.mem");
//! # Ok::<(), cflbridge_registry::RegistryError>(())
//! ```

pub mod cfl;
pub mod dims;
pub mod element;
pub mod registry;
pub mod reservation;
pub mod storage;

pub use dims::Dims;
pub use element::{ComplexF32, ELEMENT_SIZE};
pub use registry::{MemoryView, RegisteredBuffer, Registry, RegistryOptions};
pub use reservation::{ReservationRole, ReservationTracker};
pub use storage::{BufferAllocator, HeapAllocator, Ownership};

use std::path::PathBuf;

/// Registry error types
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid buffer name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Rank {rank} exceeds the maximum of {max}")]
    RankTooLarge { rank: usize, max: usize },

    #[error("Size of {0} overflows the address space")]
    SizeOverflow(Dims),

    #[error("'{name}' holds {stored}, requested {requested}")]
    DimensionMismatch {
        name: String,
        stored: Dims,
        requested: Dims,
    },

    #[error("Buffer holds {actual} elements, {expected} expected")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("'{0}' is neither registered nor backed by a file")]
    NotFound(String),

    #[error("Backing file {} holds {actual} bytes, {expected} required", path.display())]
    FileTooSmall {
        path: PathBuf,
        expected: usize,
        actual: u64,
    },

    #[error("Malformed header {}: {reason}", path.display())]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
