// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Backing memory for registered buffers
//!
//! Two regimes: caller memory the registry only points at (Borrowed), and
//! blocks the registry obtained from a [`BufferAllocator`] and must hand back
//! to it (Owned).

use std::ptr::{self, NonNull};
use std::sync::Arc;

use crate::element::ComplexF32;

/// Who frees the memory behind a registered name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Caller memory; never freed by the registry
    Borrowed,
    /// Allocated by the registry; released on unregister/replace
    Owned,
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ownership::Borrowed => write!(f, "borrowed"),
            Ownership::Owned => write!(f, "owned"),
        }
    }
}

/// Source of Owned blocks
pub trait BufferAllocator: Send + Sync {
    /// Zero-initialised block of `elements` complex values
    fn allocate(&self, elements: usize) -> Box<[ComplexF32]>;

    /// Return a block previously produced by `allocate` (or handed to the registry as Owned)
    fn release(&self, block: Box<[ComplexF32]>);
}

/// Global-heap allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn allocate(&self, elements: usize) -> Box<[ComplexF32]> {
        vec![ComplexF32::ZERO; elements].into_boxed_slice()
    }

    fn release(&self, block: Box<[ComplexF32]>) {
        drop(block);
    }
}

/// Registry-owned block. Kept as a raw pointer: the engine writes through
/// pointers handed out by `Registry::create`.
pub(crate) struct OwnedBlock {
    ptr: NonNull<ComplexF32>,
    len: usize,
    allocator: Arc<dyn BufferAllocator>,
}

impl OwnedBlock {
    pub(crate) fn new(block: Box<[ComplexF32]>, allocator: Arc<dyn BufferAllocator>) -> Self {
        let len = block.len();
        let raw = Box::into_raw(block) as *mut ComplexF32;
        // Box never yields null, even for empty slices
        let ptr = NonNull::new(raw).unwrap_or(NonNull::dangling());
        Self {
            ptr,
            len,
            allocator,
        }
    }
}

impl Drop for OwnedBlock {
    fn drop(&mut self) {
        let slice = ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
        // SAFETY: ptr/len came from Box::into_raw in `new` and are released once.
        let block = unsafe { Box::from_raw(slice) };
        self.allocator.release(block);
    }
}

/// Storage of one registered buffer
pub(crate) enum Storage {
    Borrowed { ptr: NonNull<ComplexF32>, len: usize },
    Owned(OwnedBlock),
}

// SAFETY: Owned memory is only reachable through the registry entry; Borrowed
// memory is the caller's responsibility for as long as the entry exists (see
// `Registry::register_borrowed`).
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Storage {
    pub(crate) fn as_ptr(&self) -> *mut ComplexF32 {
        match self {
            Storage::Borrowed { ptr, .. } => ptr.as_ptr(),
            Storage::Owned(block) => block.ptr.as_ptr(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Storage::Borrowed { len, .. } => *len,
            Storage::Owned(block) => block.len,
        }
    }

    pub(crate) fn ownership(&self) -> Ownership {
        match self {
            Storage::Borrowed { .. } => Ownership::Borrowed,
            Storage::Owned(_) => Ownership::Owned,
        }
    }
}
