// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Engine loaded from a shared library at runtime

use std::ffi::CString;
use std::path::{Path, PathBuf};

use cflbridge_config::EngineConfig;
use libloading::Library;
use tracing::info;

use crate::argv::ArgumentVector;
use crate::engine::{CEngine, CommandEngine, EngineEntryPoint};
use crate::transcript::Transcript;
use crate::{BridgeError, Result};

/// Command engine resolved from `<library>::<symbol>`
pub struct NativeEngine {
    engine: CEngine,
    path: PathBuf,
    symbol: String,
    // Keeps the entry point mapped; must outlive `engine`
    _library: Library,
}

impl NativeEngine {
    /// Load `path` and resolve `symbol` with the engine signature.
    ///
    /// The symbol is trusted to follow the `bart_command` calling contract.
    pub fn load(path: impl AsRef<Path>, symbol: &str) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::LibraryLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let c_symbol = CString::new(symbol).map_err(|_| BridgeError::SymbolNotFound {
            symbol: symbol.to_string(),
            path: path.display().to_string(),
            reason: "symbol contains a NUL byte".to_string(),
        })?;

        let entry: EngineEntryPoint = unsafe {
            let resolved = library
                .get::<EngineEntryPoint>(c_symbol.as_bytes_with_nul())
                .map_err(|e| BridgeError::SymbolNotFound {
                    symbol: symbol.to_string(),
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            *resolved
        };

        info!(
            "[BRIDGE] Loaded engine '{}' from {}",
            symbol,
            path.display()
        );
        Ok(Self {
            engine: unsafe { CEngine::new(entry) },
            path: path.to_path_buf(),
            symbol: symbol.to_string(),
            _library: library,
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let path = config
            .library_path
            .as_ref()
            .ok_or(BridgeError::NoLibraryConfigured)?;
        Self::load(path, &config.symbol)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl CommandEngine for NativeEngine {
    fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32 {
        self.engine.execute(argv, transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_reported() {
        let result = NativeEngine::load("/nonexistent/libbart.so", "bart_command");
        assert!(matches!(result, Err(BridgeError::LibraryLoad { .. })));
    }

    #[test]
    fn test_from_config_requires_path() {
        let result = NativeEngine::from_config(&EngineConfig::default());
        assert!(matches!(result, Err(BridgeError::NoLibraryConfigured)));
    }
}
