// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section in `cflbridge.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default transcript size handed to the engine (bytes, terminator included)
pub const DEFAULT_TRANSCRIPT_CAPACITY: usize = 4096;

/// Maximum number of dimensions the engine addresses
pub const DEFAULT_MAX_RANK: usize = 16;

/// Entry point exported by the engine library
pub const DEFAULT_ENGINE_SYMBOL: &str = "bart_command";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub transcript: TranscriptConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Transcript capture settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptConfig {
    pub capacity: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TRANSCRIPT_CAPACITY,
        }
    }
}

/// Where the native command engine comes from when none is injected
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub library_path: Option<PathBuf>,
    pub symbol: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            symbol: DEFAULT_ENGINE_SYMBOL.to_string(),
        }
    }
}

/// Registry storage settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory searched for `<name>.cfl` / `<name>.hdr` when a name is not in memory
    pub fallback_dir: Option<PathBuf>,
    pub max_rank: usize,
    /// When set, every registry name must end with this suffix (e.g. `.mem`)
    pub required_suffix: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            fallback_dir: None,
            max_rank: DEFAULT_MAX_RANK,
            required_suffix: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
