// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, applied in order:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, BridgeConfig, ConfigError, ConfigResult};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "cflbridge.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `CFLBRIDGE_CONFIG_PATH` environment variable
/// 2. Current working directory: `./cflbridge.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("CFLBRIDGE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by CFLBRIDGE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet CFLBRIDGE_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is discovered.
/// * `cli_args` - Optional CLI argument overrides (dotted keys, e.g. `transcript.capacity`)
///
/// # Errors
///
/// Returns error if the file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<BridgeConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let config: BridgeConfig = toml::from_str(&content)?;
    finish(config, cli_args)
}

/// Like [`load_config`], but a missing file (no explicit path, nothing
/// discovered) yields the defaults with overrides applied.
pub fn load_config_or_default(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<BridgeConfig> {
    if config_path.is_some() {
        return load_config(config_path, cli_args);
    }
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => finish(BridgeConfig::default(), cli_args),
        Err(e) => Err(e),
    }
}

fn finish(
    mut config: BridgeConfig,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<BridgeConfig> {
    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }
    validate_config(&config)?;
    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CFLBRIDGE_TRANSCRIPT_CAPACITY` -> `transcript.capacity`
/// - `CFLBRIDGE_ENGINE_LIBRARY` -> `engine.library_path`
/// - `CFLBRIDGE_ENGINE_SYMBOL` -> `engine.symbol`
/// - `CFLBRIDGE_FALLBACK_DIR` -> `storage.fallback_dir`
/// - `CFLBRIDGE_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut BridgeConfig) {
    if let Ok(value) = env::var("CFLBRIDGE_TRANSCRIPT_CAPACITY") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.transcript.capacity = capacity;
        }
    }
    if let Ok(value) = env::var("CFLBRIDGE_ENGINE_LIBRARY") {
        config.engine.library_path = Some(PathBuf::from(value));
    }
    if let Ok(value) = env::var("CFLBRIDGE_ENGINE_SYMBOL") {
        config.engine.symbol = value;
    }
    if let Ok(value) = env::var("CFLBRIDGE_FALLBACK_DIR") {
        config.storage.fallback_dir = Some(PathBuf::from(value));
    }
    if let Ok(value) = env::var("CFLBRIDGE_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// Keys are dotted section paths, e.g. `{"transcript.capacity": "1024"}`.
/// Unknown keys and unparsable values are ignored.
pub fn apply_cli_overrides(config: &mut BridgeConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("transcript.capacity") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.transcript.capacity = capacity;
        }
    }
    if let Some(value) = cli_args.get("engine.library_path") {
        config.engine.library_path = Some(PathBuf::from(value));
    }
    if let Some(value) = cli_args.get("engine.symbol") {
        config.engine.symbol = value.clone();
    }
    if let Some(value) = cli_args.get("storage.fallback_dir") {
        config.storage.fallback_dir = Some(PathBuf::from(value));
    }
    if let Some(value) = cli_args.get("storage.max_rank") {
        if let Ok(rank) = value.parse::<usize>() {
            config.storage.max_rank = rank;
        }
    }
    if let Some(value) = cli_args.get("storage.required_suffix") {
        config.storage.required_suffix = Some(value.clone());
    }
    if let Some(value) = cli_args.get("logging.level") {
        config.logging.level = value.clone();
    }
}
