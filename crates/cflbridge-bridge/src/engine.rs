// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Command engine seam

use std::os::raw::{c_char, c_int};
use std::ptr;

use tracing::error;

use crate::argv::ArgumentVector;
use crate::transcript::Transcript;

/// External command engine: interprets `argv` and returns a status code
/// (0 = success). When a transcript is supplied the engine may write a
/// report into it.
pub trait CommandEngine: Send + Sync {
    fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32;
}

/// C entry point: `int bart_command(int len, char* out, int argc, char* argv[])`
pub type EngineEntryPoint = unsafe extern "C" fn(
    out_len: c_int,
    out: *mut c_char,
    argc: c_int,
    argv: *mut *mut c_char,
) -> c_int;

/// Engine backed by a C function pointer
#[derive(Clone, Copy)]
pub struct CEngine {
    entry: EngineEntryPoint,
}

impl CEngine {
    /// # Safety
    ///
    /// `entry` must follow the engine contract: write at most `out_len` bytes
    /// to `out` (ignoring it when null) and treat `argv` as `argc` valid C
    /// strings followed by a null entry.
    pub unsafe fn new(entry: EngineEntryPoint) -> Self {
        Self { entry }
    }
}

impl CommandEngine for CEngine {
    fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32 {
        let mut transcript = transcript;
        let (out_len, out) = match transcript.as_deref_mut() {
            Some(t) => (t.c_capacity(), t.as_mut_ptr()),
            None => (0, ptr::null_mut()),
        };

        // C engines may permute the pointer table (getopt), never ours
        let mut table = argv.pointer_table().to_vec();

        // SAFETY: contract of `CEngine::new`; the table and every token stay
        // alive for the duration of the call.
        let status = unsafe { (self.entry)(out_len, out, argv.argc(), table.as_mut_ptr()) };

        if let Some(t) = transcript {
            t.seal();
        }
        status
    }
}

impl std::fmt::Debug for CEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CEngine")
            .field("entry", &(self.entry as *const ()))
            .finish()
    }
}

/// Placeholder used until a real engine is installed; every command fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEngine;

/// Status returned by [`UnavailableEngine`]
pub const ENGINE_UNAVAILABLE_STATUS: i32 = -1;

impl CommandEngine for UnavailableEngine {
    fn execute(&self, argv: &ArgumentVector, transcript: Option<&mut Transcript>) -> i32 {
        error!(
            "[BRIDGE] No command engine installed; cannot run {:?}",
            argv.token(0)
        );
        if let Some(out) = transcript {
            out.push_str("error: no command engine installed");
        }
        ENGINE_UNAVAILABLE_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    unsafe extern "C" fn count_args(
        out_len: c_int,
        out: *mut c_char,
        argc: c_int,
        argv: *mut *mut c_char,
    ) -> c_int {
        let mut seen = 0;
        while !(*argv.add(seen)).is_null() {
            seen += 1;
        }
        if !out.is_null() && out_len > 2 {
            *out = b'0' as c_char + seen as c_char;
            *out.add(1) = 0;
        }
        // swap the first two entries the way getopt may
        if argc >= 2 {
            std::ptr::swap(argv, argv.add(1));
        }
        if seen as c_int == argc {
            0
        } else {
            1
        }
    }

    #[test]
    fn test_c_engine_sees_terminated_argv() {
        let engine = unsafe { CEngine::new(count_args) };
        let argv = ArgumentVector::from_tokens(&["a", "b", "c"]).unwrap();
        let mut transcript = Transcript::new(8).unwrap();

        let status = engine.execute(&argv, Some(&mut transcript));

        assert_eq!(status, 0);
        assert_eq!(transcript.to_string_lossy(), "3");
        let first: &CStr = argv.token(0).unwrap();
        assert_eq!(first.to_str().unwrap(), "a");
    }

    #[test]
    fn test_c_engine_without_transcript() {
        let engine = unsafe { CEngine::new(count_args) };
        let argv = ArgumentVector::from_tokens::<&str>(&[]).unwrap();
        assert_eq!(engine.execute(&argv, None), 0);
    }

    #[test]
    fn test_unavailable_engine_fails() {
        let argv = ArgumentVector::from_tokens(&["version"]).unwrap();
        let mut transcript = Transcript::new(64).unwrap();
        let status = UnavailableEngine.execute(&argv, Some(&mut transcript));
        assert_eq!(status, ENGINE_UNAVAILABLE_STATUS);
        assert!(transcript.to_string_lossy().contains("no command engine"));
    }
}
