// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Success signalling

use std::os::raw::c_void;

use crate::{BoundaryError, Result};

/// Receives the single "call succeeded" notification
pub trait ResultSink {
    fn signal_success(&self);
}

/// Host-provided success flag: `set(user_data)` is called once on success
#[repr(C)]
pub struct SuccessFlag {
    pub set: Option<unsafe extern "C" fn(user_data: *mut c_void)>,
    pub user_data: *mut c_void,
}

/// A [`SuccessFlag`] checked for usability
pub struct ForeignSuccessFlag<'a> {
    set: unsafe extern "C" fn(*mut c_void),
    flag: &'a SuccessFlag,
}

impl<'a> ForeignSuccessFlag<'a> {
    /// # Safety
    ///
    /// `flag` must be null or point to a `SuccessFlag` valid for `'a`.
    pub unsafe fn resolve(flag: *const SuccessFlag) -> Result<Self> {
        let flag = flag
            .as_ref()
            .ok_or(BoundaryError::UnresolvedSink("null flag"))?;
        let set = flag
            .set
            .ok_or(BoundaryError::UnresolvedSink("flag has no setter"))?;
        Ok(Self { set, flag })
    }
}

impl ResultSink for ForeignSuccessFlag<'_> {
    fn signal_success(&self) {
        // SAFETY: the host supplied this callback for exactly this purpose.
        unsafe { (self.set)(self.flag.user_data) }
    }
}
