// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialisation
//!
//! Console output always; JSON files in a timestamped run folder with the
//! `file-logging` feature.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps file writers alive (they flush on drop)
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
    installed: bool,
}

impl LoggingGuard {
    /// Run folder the file layer writes into, if any
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// False when another global subscriber was already present
    pub fn installed(&self) -> bool {
        self.installed
    }
}

/// Initialise logging
///
/// `default_level` applies to everything not raised by `debug_flags`.
/// `log_dir` is only honoured with the `file-logging` feature: a
/// `run_YYYYmmdd_HHMMSS` folder is created beneath it holding `cflbridge.log`.
///
/// Calling this twice is harmless; the second guard reports
/// `installed() == false`.
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    default_level: &str,
    log_dir: Option<PathBuf>,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(default_level);
    let env_filter = EnvFilter::try_new(&filter)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guards, run_folder) = match log_dir {
        Some(base) => {
            let (layer, guard, folder) = file_layer(&base, &filter)?;
            layers.push(layer);
            (vec![guard], Some(folder))
        }
        None => (Vec::new(), None),
    };
    #[cfg(not(feature = "file-logging"))]
    let run_folder: Option<PathBuf> = {
        let _ = log_dir;
        None
    };

    let installed = Registry::default().with(layers).try_init().is_ok();
    if !installed {
        tracing::debug!("[LOGGING] Global subscriber already installed; keeping it");
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir: run_folder,
        installed,
    })
}

#[cfg(feature = "file-logging")]
fn file_layer(
    base: &Path,
    filter: &str,
) -> Result<(
    Box<dyn Layer<Registry> + Send + Sync>,
    tracing_appender::non_blocking::WorkerGuard,
    PathBuf,
)> {
    use anyhow::Context;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = base.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    let appender = tracing_appender::rolling::never(&run_folder, "cflbridge.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(EnvFilter::try_new(filter)?)
        .boxed();

    Ok((layer, guard, run_folder))
}

/// Initialise logging from `CFLBRIDGE_DEBUG` / process arguments at `info`
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(&crate::cli::parse_debug_flags(), "info", None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_does_not_fail() {
        let flags = CrateDebugFlags::default();
        let first = init_logging(&flags, "info", None).unwrap();
        let second = init_logging(&flags, "debug", None).unwrap();
        // At most one of the two can own the global subscriber
        assert!(!(first.installed() && second.installed()));
        assert!(!second.installed());
    }
}
