// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exported C functions
//!
//! Each export resolves its result sink first, then runs its body under
//! `catch_unwind`. Errors and panics are logged and leave the flag unset.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use cflbridge_bridge::{ArgumentVector, CEngine, EngineEntryPoint};
use cflbridge_registry::ComplexF32;
use tracing::{debug, error, warn};

use crate::context::BridgeContext;
use crate::marshal::{self, c_str, c_str_list, widen_dims, ForeignSlice, ForeignView, Pinned};
use crate::sink::{ForeignSuccessFlag, ResultSink, SuccessFlag};
use crate::{BoundaryError, Result};

/// Value returned to the host plus whether the flag should be set
struct Reply<T> {
    value: T,
    success: bool,
}

impl<T> Reply<T> {
    fn success(value: T) -> Self {
        Self {
            value,
            success: true,
        }
    }

    fn failure(value: T) -> Self {
        Self {
            value,
            success: false,
        }
    }
}

/// Resolve the sink, run `body`, collapse the outcome to the flag.
///
/// When the sink cannot be resolved `body` is dropped without running, which
/// releases any pins it owns.
fn boundary<T, F>(op: &str, sink: *const SuccessFlag, fallback: T, body: F) -> T
where
    F: FnOnce() -> Result<Reply<T>>,
{
    // SAFETY: the host passes either null or a live SuccessFlag.
    let sink = match unsafe { ForeignSuccessFlag::resolve(sink) } {
        Ok(sink) => sink,
        Err(e) => {
            error!("[FFI] {}: {}; call aborted", op, e);
            return fallback;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(reply)) => {
            if reply.success {
                sink.signal_success();
            }
            reply.value
        }
        Ok(Err(e)) => {
            warn!("[FFI] {} failed: {}", op, e);
            fallback
        }
        Err(_) => {
            error!("[FFI] {} panicked; flag left unset", op);
            fallback
        }
    }
}

/// # Safety
///
/// `ctx` must be null or a pointer returned by [`cflbridge_init`] and not yet freed.
unsafe fn context<'a>(ctx: *mut BridgeContext) -> Result<&'a BridgeContext> {
    ctx.as_ref().ok_or(BoundaryError::UnresolvedArgument("context"))
}

/// Create a context. `config_path` may be null (discovery, then defaults).
/// Returns null on failure.
///
/// # Safety
///
/// `config_path` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_init(config_path: *const c_char) -> *mut BridgeContext {
    let result = panic::catch_unwind(|| -> Result<BridgeContext> {
        let path = if config_path.is_null() {
            None
        } else {
            Some(c_str(config_path, "config_path")?)
        };
        BridgeContext::initialise(path.map(Path::new))
    });
    match result {
        Ok(Ok(context)) => Box::into_raw(Box::new(context)),
        Ok(Err(e)) => {
            eprintln!("[FFI] cflbridge_init failed: {}", e);
            ptr::null_mut()
        }
        Err(_) => ptr::null_mut(),
    }
}

/// Release a context and every buffer it still holds. Null is ignored.
///
/// # Safety
///
/// `ctx` must be null or a pointer returned by [`cflbridge_init`], freed once.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_free(ctx: *mut BridgeContext) {
    if ctx.is_null() {
        return;
    }
    let context = Box::from_raw(ctx);
    if panic::catch_unwind(AssertUnwindSafe(move || drop(context))).is_err() {
        error!("[FFI] Panic while releasing context");
    }
}

/// # Safety
///
/// Pointer arguments must be null or valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_is_registered(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
) -> bool {
    boundary("is_registered", sink, false, || {
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        Ok(Reply::success(context.registry.exists(name)))
    })
}

/// Register `data_len` bytes of host memory under `name` (replacing any
/// existing entry). The memory stays the host's; it must outlive the entry.
///
/// # Safety
///
/// `data` must be null or valid for `data_len` bytes; misaligned buffers are
/// rejected. Other pointers must be null or valid for the call. The `dims`
/// pin is released before returning on every path.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_register_input(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
    dims: *const ForeignSlice,
    data: *mut c_void,
    data_len: usize,
) {
    // Pinned before anything else can fail; the body owns the guard
    let pinned = Pinned::<i32>::acquire(dims, "dims");
    boundary("register_input", sink, (), || {
        let pinned = pinned?;
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        let dims = widen_dims(pinned.as_slice())?;
        let data = NonNull::new(data as *mut ComplexF32)
            .ok_or(BoundaryError::UnresolvedArgument("buffer"))?;
        let align = std::mem::align_of::<ComplexF32>();
        if data.as_ptr() as usize % align != 0 {
            return Err(BoundaryError::MisalignedBuffer {
                address: data.as_ptr() as usize,
                align,
            });
        }

        let expected = dims.byte_size()?;
        if data_len < expected {
            return Err(BoundaryError::BufferTooSmall {
                expected,
                actual: data_len,
            });
        }

        context.registry.register_borrowed(name, dims, data)?;
        Ok(Reply::success(()))
    })
}

/// Declare that `name` will be produced by a later command. Allocates nothing.
///
/// # Safety
///
/// Pointer arguments must be null or valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_register_output(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
) {
    boundary("register_output", sink, (), || {
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        context.registry.reserve_output(name);
        Ok(Reply::success(()))
    })
}

/// Resolve `name` and write a view over its memory to `out`.
///
/// The view is not a copy; it stays valid until `name` is unregistered or
/// replaced.
///
/// # Safety
///
/// Pointer arguments must be null or valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_load_memory(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
    dims: *const ForeignSlice,
    out: *mut ForeignView,
) {
    let pinned = Pinned::<i32>::acquire(dims, "dims");
    boundary("load_memory", sink, (), || {
        let dims = {
            let pinned = pinned?;
            widen_dims(pinned.as_slice())?
        };
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        let out = out.as_mut().ok_or(BoundaryError::UnresolvedArgument("out"))?;

        *out = marshal::hand_back(&context.registry, name, &dims)?;
        Ok(Reply::success(()))
    })
}

/// Write the stored dims of `name` into `out_dims` (capacity `out_capacity`)
/// and the rank into `out_rank`.
///
/// # Safety
///
/// `out_dims` must be valid for `out_capacity` writes. Other pointers must
/// be null or valid for the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_query_dims(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
    out_dims: *mut i32,
    out_capacity: usize,
    out_rank: *mut usize,
) {
    boundary("query_dims", sink, (), || {
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        if out_dims.is_null() || out_rank.is_null() {
            return Err(BoundaryError::UnresolvedArgument("out_dims"));
        }
        let dims = context.registry.dims_of(name)?;
        let out = std::slice::from_raw_parts_mut(out_dims, out_capacity);
        *out_rank = marshal::narrow_dims(&dims, out)?;
        Ok(Reply::success(()))
    })
}

/// Remove `name`. Unknown names are not an error.
///
/// # Safety
///
/// Pointer arguments must be null or valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_unregister(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
) {
    boundary("unregister", sink, (), || {
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        context.registry.unregister(name);
        Ok(Reply::success(()))
    })
}

fn argument_vector(tokens: &[&CStr]) -> Result<ArgumentVector> {
    Ok(ArgumentVector::from_c_strs(tokens)?)
}

/// Run a command. The flag is set only when the engine returns 0.
///
/// # Safety
///
/// `tokens` must hold `count` NUL-terminated strings (null when `count` is 0).
#[no_mangle]
pub unsafe extern "C" fn cflbridge_run(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    tokens: *const *const c_char,
    count: usize,
) -> c_int {
    boundary("run", sink, -1, || {
        let context = context(ctx)?;
        let argv = argument_vector(&c_str_list(tokens, count)?)?;
        let outcome = context.bridge.execute(argv, 0)?;
        Ok(if outcome.is_success() {
            Reply::success(outcome.status)
        } else {
            Reply::failure(outcome.status)
        })
    })
}

/// Run a command and return its transcript (configured capacity). The
/// transcript is returned even when the command fails; the flag is set only
/// on status 0. Free the result with [`cflbridge_string_free`].
///
/// # Safety
///
/// `tokens` must hold `count` NUL-terminated strings (null when `count` is 0).
#[no_mangle]
pub unsafe extern "C" fn cflbridge_read_output(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    tokens: *const *const c_char,
    count: usize,
) -> *mut c_char {
    boundary("read_output", sink, ptr::null_mut(), || {
        let context = context(ctx)?;
        let argv = argument_vector(&c_str_list(tokens, count)?)?;
        let outcome = context
            .bridge
            .execute(argv, context.bridge.transcript_capacity())?;

        let text = outcome.transcript.clone().unwrap_or_default();
        // Lossy conversion never yields NUL bytes
        let raw = CString::new(text)
            .map(CString::into_raw)
            .unwrap_or(ptr::null_mut());
        Ok(if outcome.is_success() {
            Reply::success(raw)
        } else {
            Reply::failure(raw)
        })
    })
}

/// Free a string returned by [`cflbridge_read_output`]. Null is ignored.
///
/// # Safety
///
/// `s` must come from [`cflbridge_read_output`] and be freed once.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Install the C entry point commands are run against.
///
/// # Safety
///
/// `entry` must follow the `bart_command` calling contract.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_set_engine(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    entry: Option<EngineEntryPoint>,
) {
    boundary("set_engine", sink, (), || {
        let context = context(ctx)?;
        let entry = entry.ok_or(BoundaryError::UnresolvedArgument("entry"))?;
        context.bridge.set_engine(Arc::new(CEngine::new(entry)));
        Ok(Reply::success(()))
    })
}

/// Engine side: materialise a zeroed Owned output under `name` and return
/// its data pointer (null on failure).
///
/// # Safety
///
/// `dims` must be valid for `rank` reads (null when `rank` is 0). Other
/// pointers must be null or valid for the call.
#[no_mangle]
pub unsafe extern "C" fn cflbridge_create_output(
    ctx: *mut BridgeContext,
    sink: *const SuccessFlag,
    name: *const c_char,
    dims: *const i32,
    rank: usize,
) -> *mut c_void {
    boundary("create_output", sink, ptr::null_mut(), || {
        let context = context(ctx)?;
        let name = c_str(name, "name")?;
        let extents: &[i32] = match rank {
            0 => &[],
            _ if dims.is_null() => return Err(BoundaryError::UnresolvedArgument("dims")),
            n => std::slice::from_raw_parts(dims, n),
        };
        let dims = widen_dims(extents)?;
        let data = context.registry.create(name, dims)?;
        debug!("[FFI] Engine created output '{}'", name);
        Ok(Reply::success(data.as_ptr() as *mut c_void))
    })
}
