// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Owned C argument vectors

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use crate::{BridgeError, Result};

/// `argv`-style token list owned by the bridge.
///
/// Every token is an independent heap copy, so the caller may free or reuse
/// its originals while the engine runs. The pointer table always ends with a
/// null entry. All copies are released when the vector is dropped.
pub struct ArgumentVector {
    table: Vec<*mut c_char>,
    argc: c_int,
}

impl ArgumentVector {
    /// Duplicate UTF-8 tokens. Fails without allocating the table when a token
    /// contains a NUL byte.
    pub fn from_tokens<T: AsRef<str>>(tokens: &[T]) -> Result<Self> {
        let owned = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                CString::new(token.as_ref()).map_err(|_| BridgeError::InvalidToken { index })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_owned(owned)
    }

    /// Duplicate C strings received from a foreign caller
    pub fn from_c_strs(tokens: &[&CStr]) -> Result<Self> {
        Self::from_owned(tokens.iter().map(|t| CString::from(*t)).collect())
    }

    fn from_owned(tokens: Vec<CString>) -> Result<Self> {
        let argc = c_int::try_from(tokens.len())
            .map_err(|_| BridgeError::TooManyTokens(tokens.len()))?;
        let mut table: Vec<*mut c_char> = tokens.into_iter().map(CString::into_raw).collect();
        table.push(ptr::null_mut());
        Ok(Self { table, argc })
    }

    pub fn argc(&self) -> c_int {
        self.argc
    }

    pub fn len(&self) -> usize {
        self.table.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pointer table including the trailing null
    pub fn pointer_table(&self) -> &[*mut c_char] {
        &self.table
    }

    /// `argv` for C engines
    pub fn as_ptr(&self) -> *const *mut c_char {
        self.table.as_ptr()
    }

    pub fn token(&self, index: usize) -> Option<&CStr> {
        let raw = *self.table[..self.len()].get(index)?;
        // SAFETY: every non-null entry came from CString::into_raw and lives
        // until drop.
        Some(unsafe { CStr::from_ptr(raw) })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> + '_ {
        (0..self.len()).filter_map(move |i| self.token(i))
    }

    /// Lossy UTF-8 copies of the tokens
    pub fn to_strings(&self) -> Vec<String> {
        self.iter()
            .map(|t| t.to_string_lossy().into_owned())
            .collect()
    }
}

impl Drop for ArgumentVector {
    fn drop(&mut self) {
        for raw in self.table.drain(..).filter(|p| !p.is_null()) {
            // SAFETY: produced by CString::into_raw in `from_owned`, freed once.
            drop(unsafe { CString::from_raw(raw) });
        }
    }
}

impl std::fmt::Debug for ArgumentVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
