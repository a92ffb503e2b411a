// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-host state behind the opaque context pointer

use std::path::Path;
use std::sync::Arc;

use cflbridge_bridge::{CommandBridge, CommandEngine};
use cflbridge_config::{load_config_or_default, BridgeConfig};
use cflbridge_observability::{init_logging, parse_debug_flags, LoggingGuard};
use cflbridge_registry::{Registry, RegistryOptions};
use tracing::{info, warn};

use crate::Result;

/// Registry + bridge owned by one host
pub struct BridgeContext {
    pub registry: Registry,
    pub bridge: CommandBridge,
    config: BridgeConfig,
    _logging: Option<LoggingGuard>,
}

impl BridgeContext {
    /// Build from an explicit configuration (no logging installed)
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let registry = Registry::new(RegistryOptions::from_config(&config.storage));
        let bridge = CommandBridge::from_config(&config)?;
        Ok(Self {
            registry,
            bridge,
            config,
            _logging: None,
        })
    }

    /// Context with an injected engine
    pub fn with_engine(config: BridgeConfig, engine: Arc<dyn CommandEngine>) -> Self {
        let registry = Registry::new(RegistryOptions::from_config(&config.storage));
        let bridge = CommandBridge::new(engine, config.transcript.capacity);
        Self {
            registry,
            bridge,
            config,
            _logging: None,
        }
    }

    /// Load configuration (explicit path or discovery), install logging and
    /// build the context.
    pub fn initialise(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_or_default(config_path, None)?;

        let logging = match init_logging(&parse_debug_flags(), &config.logging.level, None) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("[FFI] Logging unavailable: {}", e);
                None
            }
        };
        if logging.as_ref().is_some_and(|g| !g.installed()) {
            warn!("[FFI] A global subscriber was already installed; keeping it");
        }

        let mut context = Self::new(config)?;
        context._logging = logging;
        info!(
            "[FFI] Context ready (transcript capacity {} bytes)",
            context.config.transcript.capacity
        );
        Ok(context)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl Drop for BridgeContext {
    fn drop(&mut self) {
        let remaining = self.registry.len();
        if remaining > 0 {
            info!("[FFI] Releasing context with {} registered buffers", remaining);
        }
        self.registry.clear();
    }
}
