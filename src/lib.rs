// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # cflbridge
//!
//! Hands complex-float arrays to an external command-line reconstruction
//! engine by name, without going through the filesystem.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! cflbridge = "0.1"
//! ```
//!
//! ## Feature Flags
//!
//! - **`native-engine`**: load the engine from a shared library (`libloading`)
//! - **`file-logging`**: JSON log files in a timestamped run folder
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cflbridge::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let config = cflbridge::config::load_config_or_default(None, None)?;
//! let session = Session::from_config(&config)?;
//!
//! let phantom = ArrayD::from_elem(IxDyn(&[128, 128]), ComplexF32::new(1.0, -1.0));
//! let magnitude = session.run(&["cabs".into(), (&phantom).into()])?;
//! let version = session.read(&["version".into()])?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Session (generated names, ndarray in/out)              │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌──────────────────────────────┐ ┌────────────────────────┐
//! │  cflbridge-registry          │ │  cflbridge-bridge      │
//! │  (names → buffers, fallback) │ │  (argv, transcript)    │
//! └──────────────────────────────┘ └────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  cflbridge-ffi: C ABI for host runtimes                 │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub mod session;

pub use cflbridge_bridge as bridge;
pub use cflbridge_config as config;
pub use cflbridge_observability as observability;
pub use cflbridge_registry as registry;

pub use session::{CommandArg, Session, SessionError};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::bridge::{CommandBridge, CommandEngine, CommandOutcome, Transcript};
    pub use crate::registry::{ComplexF32, Dims, MemoryView, Registry};
    pub use crate::session::{CommandArg, Session, SessionError};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let registry = Registry::default();
        assert!(!registry.exists("anything"));
        assert_eq!(Dims::from([2, 2]).element_count().unwrap(), 4);
    }
}
