// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command bridge
//!
//! ```text
//! tokens ──► ArgumentVector (owned copies + null entry)
//!                  │
//!                  ▼
//!           CommandEngine::execute(argv, transcript?) ──► status
//!                  │
//!                  ▼
//!           CommandOutcome { status, transcript }   (argv dropped here)
//! ```

use std::sync::Arc;

use cflbridge_config::BridgeConfig;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::argv::ArgumentVector;
use crate::engine::{CommandEngine, UnavailableEngine};
use crate::transcript::Transcript;
use crate::Result;

/// Status and optional report of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: i32,
    /// Present whenever a transcript was requested, even on failure
    pub transcript: Option<String>,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// First line of the transcript, trimmed
    pub fn first_line(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .map(|t| t.lines().next().unwrap_or("").trim())
    }
}

/// Runs commands against the installed engine
pub struct CommandBridge {
    engine: RwLock<Arc<dyn CommandEngine>>,
    transcript_capacity: usize,
}

impl CommandBridge {
    /// `transcript_capacity` is the default used by [`CommandBridge::read_output`]
    pub fn new(engine: Arc<dyn CommandEngine>, transcript_capacity: usize) -> Self {
        Self {
            engine: RwLock::new(engine),
            transcript_capacity,
        }
    }

    /// Bridge with no engine installed yet (commands fail until
    /// [`CommandBridge::set_engine`] is called)
    pub fn unavailable(config: &BridgeConfig) -> Self {
        Self::new(Arc::new(UnavailableEngine), config.transcript.capacity)
    }

    /// Bridge for `config`: loads the engine library when one is configured
    /// and the `native-engine` feature is on, otherwise starts unavailable.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        #[cfg(feature = "native-engine")]
        if config.engine.library_path.is_some() {
            let engine = crate::native::NativeEngine::from_config(&config.engine)?;
            return Ok(Self::new(Arc::new(engine), config.transcript.capacity));
        }

        if let Some(path) = &config.engine.library_path {
            warn!(
                "[BRIDGE] Engine library {} configured but native-engine support is not compiled in",
                path.display()
            );
        }
        Ok(Self::unavailable(config))
    }

    pub fn set_engine(&self, engine: Arc<dyn CommandEngine>) {
        *self.engine.write() = engine;
        info!("[BRIDGE] Command engine replaced");
    }

    pub fn transcript_capacity(&self) -> usize {
        self.transcript_capacity
    }

    /// Run without a transcript; returns the engine status
    pub fn run<T: AsRef<str>>(&self, tokens: &[T]) -> Result<i32> {
        let argv = ArgumentVector::from_tokens(tokens)?;
        self.execute(argv, 0).map(|outcome| outcome.status)
    }

    /// Run with a transcript of `capacity` bytes (0 = no transcript)
    pub fn run_capturing_output<T: AsRef<str>>(
        &self,
        tokens: &[T],
        capacity: usize,
    ) -> Result<CommandOutcome> {
        let argv = ArgumentVector::from_tokens(tokens)?;
        self.execute(argv, capacity)
    }

    /// Run with the configured transcript capacity
    pub fn read_output<T: AsRef<str>>(&self, tokens: &[T]) -> Result<CommandOutcome> {
        self.run_capturing_output(tokens, self.transcript_capacity)
    }

    /// Run a prepared argument vector. The vector (and every token copy) is
    /// released before this returns, whatever the outcome.
    pub fn execute(&self, argv: ArgumentVector, capacity: usize) -> Result<CommandOutcome> {
        let mut transcript = match capacity {
            0 => None,
            n => Some(Transcript::new(n)?),
        };
        let engine = self.engine.read().clone();

        debug!("[BRIDGE] Running {:?} (transcript {} bytes)", argv, capacity);
        let status = engine.execute(&argv, transcript.as_mut());
        drop(argv);

        let transcript = transcript.map(|t| {
            if t.is_truncated() {
                debug!("[BRIDGE] Transcript truncated to {} bytes", t.len());
            }
            t.to_string_lossy()
        });

        if status == 0 {
            debug!("[BRIDGE] Command finished (status 0)");
        } else {
            warn!("[BRIDGE] Command failed with status {}", status);
        }
        Ok(CommandOutcome { status, transcript })
    }
}

impl std::fmt::Debug for CommandBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBridge")
            .field("transcript_capacity", &self.transcript_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let outcome = CommandOutcome {
            status: 0,
            transcript: Some("  v0.9.00 \nsecond line\n".to_string()),
        };
        assert_eq!(outcome.first_line(), Some("v0.9.00"));

        let empty = CommandOutcome {
            status: 0,
            transcript: Some(String::new()),
        };
        assert_eq!(empty.first_line(), Some(""));
    }

    #[test]
    fn test_unavailable_bridge_reports_failure() {
        let bridge = CommandBridge::unavailable(&BridgeConfig::default());
        let outcome = bridge.read_output(&["version"]).unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.transcript.is_some());
    }
}
