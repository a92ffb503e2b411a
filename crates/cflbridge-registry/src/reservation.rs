// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Advisory input/output reservations
//!
//! Records which names a caller intends to pass in or read back before the
//! engine runs. Reservations never fail and never lock a name; the registry
//! consults them when a buffer materialises and clears them on unregister.

use ahash::AHashMap;
use tracing::warn;

use crate::storage::Ownership;

/// Declared role of a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationRole {
    ReservedInput,
    ReservedOutput,
}

impl ReservationRole {
    /// Role implied by how a buffer was registered: caller memory is an
    /// input, registry-allocated memory is an engine output.
    pub fn implied_by(ownership: Ownership) -> Self {
        match ownership {
            Ownership::Borrowed => ReservationRole::ReservedInput,
            Ownership::Owned => ReservationRole::ReservedOutput,
        }
    }
}

impl std::fmt::Display for ReservationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationRole::ReservedInput => write!(f, "input"),
            ReservationRole::ReservedOutput => write!(f, "output"),
        }
    }
}

/// Name → role table (last writer wins)
#[derive(Debug, Default)]
pub struct ReservationTracker {
    roles: AHashMap<String, ReservationRole>,
}

impl ReservationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve_input(&mut self, name: &str) {
        self.roles
            .insert(name.to_string(), ReservationRole::ReservedInput);
    }

    pub fn reserve_output(&mut self, name: &str) {
        self.roles
            .insert(name.to_string(), ReservationRole::ReservedOutput);
    }

    pub fn role(&self, name: &str) -> Option<ReservationRole> {
        self.roles.get(name).copied()
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    /// Consulted when a buffer is registered under `name`.
    ///
    /// A name declared for the opposite role is re-declared for the role the
    /// registration implies, with a warning: the same name must not stay
    /// both a caller-owned input and an engine-owned output. Returns the
    /// role recorded before this registration, if any.
    pub fn consult(&mut self, name: &str, ownership: Ownership) -> Option<ReservationRole> {
        let implied = ReservationRole::implied_by(ownership);
        let previous = self.roles.insert(name.to_string(), implied);
        if let Some(declared) = previous {
            if declared != implied {
                warn!(
                    "[REGISTRY] '{}' was reserved as {} but is being registered as {} ({} buffer)",
                    name, declared, implied, ownership
                );
            }
        }
        previous
    }

    pub fn release(&mut self, name: &str) -> Option<ReservationRole> {
        self.roles.remove(name)
    }

    pub fn clear(&mut self) {
        self.roles.clear();
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}
