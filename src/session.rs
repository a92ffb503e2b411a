// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! High-level command session
//!
//! Mixes plain arguments and arrays in one call; arrays are registered under
//! generated names for the duration of the command and unregistered on every
//! path afterwards.
//!
//! Inputs passed as [`CommandArg::Array`] are read-only to the engine; an
//! engine that updates an argument in place needs [`CommandArg::InOut`].

use std::sync::Arc;

use cflbridge_bridge::{BridgeError, CommandBridge, CommandEngine};
use cflbridge_config::BridgeConfig;
use cflbridge_registry::{ComplexF32, Dims, Registry, RegistryError, RegistryOptions};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, ErrorKind, IxDyn, ShapeBuilder, ShapeError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The engine ran and returned a non-zero status
    #[error("Running the engine was unsuccessful (status {status})")]
    Unsuccessful {
        status: i32,
        transcript: Option<String>,
    },

    /// The command could not be set up, or its result could not be read back
    #[error("Fatal error while running the engine: {source}")]
    Fatal {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<RegistryError> for SessionError {
    fn from(e: RegistryError) -> Self {
        SessionError::Fatal {
            source: Box::new(e),
        }
    }
}

impl From<BridgeError> for SessionError {
    fn from(e: BridgeError) -> Self {
        SessionError::Fatal {
            source: Box::new(e),
        }
    }
}

impl From<ShapeError> for SessionError {
    fn from(e: ShapeError) -> Self {
        SessionError::Fatal {
            source: Box::new(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// One positional argument
#[derive(Debug)]
pub enum CommandArg<'a> {
    Text(String),
    Int(i64),
    Float(f64),
    /// Complex array, registered for the call under a generated name. The
    /// engine must not write to it.
    Array(ArrayViewD<'a, ComplexF32>),
    /// Column-major complex array the engine may update in place
    InOut(ArrayViewMutD<'a, ComplexF32>),
}

impl CommandArg<'_> {
    fn render(&self) -> Option<String> {
        match self {
            CommandArg::Text(text) => Some(text.clone()),
            CommandArg::Int(value) => Some(value.to_string()),
            CommandArg::Float(value) => Some(value.to_string()),
            CommandArg::Array(_) | CommandArg::InOut(_) => None,
        }
    }
}

impl From<&str> for CommandArg<'_> {
    fn from(text: &str) -> Self {
        CommandArg::Text(text.to_string())
    }
}

impl From<String> for CommandArg<'_> {
    fn from(text: String) -> Self {
        CommandArg::Text(text)
    }
}

impl From<i32> for CommandArg<'_> {
    fn from(value: i32) -> Self {
        CommandArg::Int(value.into())
    }
}

impl From<i64> for CommandArg<'_> {
    fn from(value: i64) -> Self {
        CommandArg::Int(value)
    }
}

impl From<f32> for CommandArg<'_> {
    fn from(value: f32) -> Self {
        CommandArg::Float(value.into())
    }
}

impl From<f64> for CommandArg<'_> {
    fn from(value: f64) -> Self {
        CommandArg::Float(value)
    }
}

impl<'a> From<ArrayViewD<'a, ComplexF32>> for CommandArg<'a> {
    fn from(view: ArrayViewD<'a, ComplexF32>) -> Self {
        CommandArg::Array(view)
    }
}

impl<'a> From<&'a ArrayD<ComplexF32>> for CommandArg<'a> {
    fn from(array: &'a ArrayD<ComplexF32>) -> Self {
        CommandArg::Array(array.view())
    }
}

impl<'a> From<ArrayViewMutD<'a, ComplexF32>> for CommandArg<'a> {
    fn from(view: ArrayViewMutD<'a, ComplexF32>) -> Self {
        CommandArg::InOut(view)
    }
}

impl<'a> From<&'a mut ArrayD<ComplexF32>> for CommandArg<'a> {
    fn from(array: &'a mut ArrayD<ComplexF32>) -> Self {
        CommandArg::InOut(array.view_mut())
    }
}

/// Names registered for one call; unregistered on drop
struct Scratch<'r> {
    registry: &'r Registry,
    names: Vec<String>,
}

impl<'r> Scratch<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            names: Vec::new(),
        }
    }

    fn fresh_name(&mut self) -> String {
        let suffix = self
            .registry
            .options()
            .required_suffix
            .as_deref()
            .unwrap_or(".mem");
        let name = format!("{}{}", Uuid::now_v7().simple(), suffix);
        self.names.push(name.clone());
        name
    }

    /// Register `array` in column-major order under a fresh name. Arrays
    /// already laid out column-major are borrowed; others are copied.
    fn register_array(&mut self, array: &ArrayViewD<'_, ComplexF32>) -> Result<String> {
        let name = self.fresh_name();
        let dims = Dims::from(array.shape());
        let column_major = array.t();

        match column_major.as_slice() {
            Some(contiguous) => {
                let data = std::ptr::NonNull::from(contiguous).cast::<ComplexF32>();
                // SAFETY: the view outlives the registration (unregistered in
                // Scratch::drop before the borrow ends). Shared inputs are
                // read-only to the engine.
                unsafe { self.registry.register_borrowed(&name, dims, data)? };
            }
            None => {
                let block: Box<[ComplexF32]> = column_major.iter().copied().collect();
                self.registry.register_owned(&name, dims, block)?;
            }
        }
        Ok(name)
    }

    /// Register a writable array in place. Only column-major layouts can be
    /// shared with the engine without a copy-back.
    fn register_in_out(&mut self, array: &ArrayViewMutD<'_, ComplexF32>) -> Result<String> {
        let layout_error = || ShapeError::from_kind(ErrorKind::IncompatibleLayout);
        if array.t().as_slice().is_none() {
            return Err(layout_error().into());
        }
        // Pointer of the mutable view, valid for writes for the view's lifetime
        let data = std::ptr::NonNull::new(array.as_ptr() as *mut ComplexF32)
            .ok_or_else(layout_error)?;
        let name = self.fresh_name();
        // SAFETY: as in `register_array`; the mutable borrow held by the
        // argument makes engine writes visible to the caller afterwards.
        unsafe {
            self.registry
                .register_borrowed(&name, Dims::from(array.shape()), data)?
        };
        Ok(name)
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            self.registry.unregister(name);
        }
    }
}

/// Registry + bridge pair for issuing commands
pub struct Session {
    registry: Arc<Registry>,
    bridge: Arc<CommandBridge>,
}

impl Session {
    pub fn new(registry: Arc<Registry>, bridge: Arc<CommandBridge>) -> Self {
        Self { registry, bridge }
    }

    /// Session for `config` (engine library per `[engine]`, if compiled in)
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let registry = Registry::new(RegistryOptions::from_config(&config.storage));
        let bridge = CommandBridge::from_config(config)?;
        Ok(Self::new(Arc::new(registry), Arc::new(bridge)))
    }

    /// Session over an existing registry with an injected engine
    pub fn with_engine(
        registry: Arc<Registry>,
        engine: Arc<dyn CommandEngine>,
        config: &BridgeConfig,
    ) -> Self {
        let bridge = CommandBridge::new(engine, config.transcript.capacity);
        Self::new(registry, Arc::new(bridge))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<CommandBridge> {
        &self.bridge
    }

    /// Run a command for its side effects
    pub fn execute(&self, args: &[CommandArg<'_>]) -> Result<()> {
        let mut scratch = Scratch::new(&self.registry);
        let tokens = self.tokens(args, &mut scratch)?;
        let status = self.bridge.run(&tokens)?;
        check(status, None)
    }

    /// Run a command and return the first line of its report, trimmed
    pub fn read(&self, args: &[CommandArg<'_>]) -> Result<String> {
        let mut scratch = Scratch::new(&self.registry);
        let tokens = self.tokens(args, &mut scratch)?;
        let outcome = self.bridge.read_output(&tokens)?;
        let line = outcome.first_line().unwrap_or("").to_string();
        check(outcome.status, outcome.transcript)?;
        Ok(line)
    }

    /// Run a command whose last argument is an output the engine creates,
    /// and return that output
    pub fn run(&self, args: &[CommandArg<'_>]) -> Result<ArrayD<ComplexF32>> {
        let mut scratch = Scratch::new(&self.registry);
        let mut tokens = self.tokens(args, &mut scratch)?;
        let output = scratch.fresh_name();
        self.registry.reserve_output(&output);
        tokens.push(output.clone());

        let status = self.bridge.run(&tokens)?;
        check(status, None)?;

        let dims = self.registry.dims_of(&output)?;
        let view = self.registry.load(&output, &dims)?;
        let elements = view.to_elements();
        self.registry.unmap(view);

        let array = ArrayD::from_shape_vec(IxDyn(dims.as_slice()).f(), elements)?;
        debug!("[SESSION] '{}' produced an array of shape {}", tokens[0], dims);
        Ok(array)
    }

    fn tokens(&self, args: &[CommandArg<'_>], scratch: &mut Scratch<'_>) -> Result<Vec<String>> {
        args.iter()
            .map(|arg| match arg {
                CommandArg::Array(array) => scratch.register_array(array),
                CommandArg::InOut(array) => scratch.register_in_out(array),
                other => Ok(other.render().unwrap_or_default()),
            })
            .collect()
    }
}

fn check(status: i32, transcript: Option<String>) -> Result<()> {
    if status == 0 {
        Ok(())
    } else {
        warn!("[SESSION] Engine returned status {}", status);
        Err(SessionError::Unsuccessful { status, transcript })
    }
}
