// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Foreign value decoding
//!
//! Host arrays are pinned for one call at most. [`Pinned`] releases the pin
//! when dropped, so early returns through `?` and unwinding panics release
//! it as well.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_void};

use cflbridge_registry::{Dims, Registry};
use tracing::debug;

use crate::{BoundaryError, Result};

/// Borrowed host array: `len` elements at `data`, unpinned by
/// `release(context)`
#[repr(C)]
pub struct ForeignSlice {
    pub data: *const c_void,
    pub len: usize,
    pub release: Option<unsafe extern "C" fn(context: *mut c_void)>,
    pub context: *mut c_void,
}

/// Scoped acquisition of a [`ForeignSlice`] holding `T` elements
pub struct Pinned<'a, T> {
    slice: &'a ForeignSlice,
    _element: PhantomData<&'a [T]>,
}

impl<'a, T> Pinned<'a, T> {
    /// Take ownership of the pin. The release callback runs exactly once,
    /// even when validation below fails.
    ///
    /// # Safety
    ///
    /// `slice` must be null or point to a `ForeignSlice` whose `data` holds
    /// `len` properly aligned `T` values for `'a`.
    pub unsafe fn acquire(slice: *const ForeignSlice, name: &'static str) -> Result<Self> {
        let slice = slice
            .as_ref()
            .ok_or(BoundaryError::UnresolvedArgument(name))?;
        let pinned = Self {
            slice,
            _element: PhantomData,
        };
        if slice.data.is_null() && slice.len > 0 {
            return Err(BoundaryError::UnresolvedArgument(name));
        }
        Ok(pinned)
    }

    pub fn as_slice(&self) -> &[T] {
        if self.slice.len == 0 {
            return &[];
        }
        // SAFETY: checked non-null in `acquire`; layout per its contract.
        unsafe { std::slice::from_raw_parts(self.slice.data as *const T, self.slice.len) }
    }
}

impl<T> Drop for Pinned<'_, T> {
    fn drop(&mut self) {
        if let Some(release) = self.slice.release {
            // SAFETY: host-supplied release for this pin, called once.
            unsafe { release(self.slice.context) }
        }
    }
}

/// Host dims (`i32`) to registry dims, widening each extent.
pub fn widen_dims(extents: &[i32]) -> Result<Dims> {
    extents
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            usize::try_from(value).map_err(|_| BoundaryError::NegativeExtent { index, value })
        })
        .collect::<Result<Vec<_>>>()
        .map(Dims::from)
}

/// Registry dims to host dims; refuses to narrow an extent that does not fit.
pub fn narrow_dims(dims: &Dims, out: &mut [i32]) -> Result<usize> {
    let rank = dims.rank();
    if out.len() < rank {
        return Err(BoundaryError::OutputTooSmall {
            capacity: out.len(),
            rank,
        });
    }
    for (index, (&value, slot)) in dims.as_slice().iter().zip(out.iter_mut()).enumerate() {
        *slot = i32::try_from(value).map_err(|_| BoundaryError::ExtentTooLarge { index, value })?;
    }
    Ok(rank)
}

/// # Safety
///
/// `ptr` must be null or a NUL-terminated string valid for `'a`.
pub unsafe fn c_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BoundaryError::UnresolvedArgument(name));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BoundaryError::InvalidUtf8 { name })
}

/// # Safety
///
/// `tokens` must be null (with `count == 0`) or point to `count` valid
/// NUL-terminated strings.
pub unsafe fn c_str_list<'a>(tokens: *const *const c_char, count: usize) -> Result<Vec<&'a CStr>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if tokens.is_null() {
        return Err(BoundaryError::UnresolvedArgument("tokens"));
    }
    std::slice::from_raw_parts(tokens, count)
        .iter()
        .map(|&token| {
            if token.is_null() {
                Err(BoundaryError::UnresolvedArgument("tokens"))
            } else {
                Ok(CStr::from_ptr(token))
            }
        })
        .collect()
}

/// Memory handed back to the host: a view over registry memory, not a copy
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignView {
    pub data: *const c_void,
    pub byte_size: usize,
}

impl ForeignView {
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            byte_size: 0,
        }
    }
}

/// Resolve `name` for the host and hand back a view over resident memory.
///
/// A file-backed name is first copied into an Owned entry so that the file
/// mapping is released before returning; the returned pointer then stays
/// valid until `name` is unregistered or replaced.
pub fn hand_back(registry: &Registry, name: &str, dims: &Dims) -> Result<ForeignView> {
    let mut view = registry.load(name, dims)?;
    if view.is_mapped() {
        registry.adopt(name, view)?;
        view = registry.load(name, dims)?;
    }
    let foreign = ForeignView {
        data: view.as_ptr() as *const c_void,
        byte_size: view.byte_size(),
    };
    registry.unmap(view);
    debug!("[FFI] Handed back '{}' ({} bytes)", name, foreign.byte_size);
    Ok(foreign)
}
