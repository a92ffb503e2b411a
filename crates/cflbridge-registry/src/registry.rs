// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Named buffer table
//!
//! One mutex guards both the name table and the reservations, so replace
//! (unregister-then-insert) is atomic per name. Entries are reference counted:
//! a [`MemoryView`] returned by [`Registry::load`] keeps its entry alive after
//! an `unregister`, and memory goes back to the allocator only when the last
//! view is unmapped.

use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::Arc;

use ahash::AHashMap;
use cflbridge_config::{StorageConfig, DEFAULT_MAX_RANK};
use memmap2::Mmap;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cfl;
use crate::dims::Dims;
use crate::element::ComplexF32;
use crate::reservation::{ReservationRole, ReservationTracker};
use crate::storage::{BufferAllocator, HeapAllocator, OwnedBlock, Ownership, Storage};
use crate::{RegistryError, Result};

/// Registry construction options
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryOptions {
    /// Directory searched for `<name>.cfl` when a name is not resident
    pub fallback_dir: Option<PathBuf>,
    pub max_rank: usize,
    /// When set, every registered name must end with this suffix
    pub required_suffix: Option<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            fallback_dir: None,
            max_rank: DEFAULT_MAX_RANK,
            required_suffix: None,
        }
    }
}

impl RegistryOptions {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            fallback_dir: config.fallback_dir.clone(),
            max_rank: config.max_rank,
            required_suffix: config.required_suffix.clone(),
        }
    }
}

/// One entry of the table
pub struct RegisteredBuffer {
    name: String,
    dims: Dims,
    storage: Storage,
}

impl RegisteredBuffer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn ownership(&self) -> Ownership {
        self.storage.ownership()
    }

    pub fn as_ptr(&self) -> *mut ComplexF32 {
        self.storage.as_ptr()
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }
}

impl std::fmt::Debug for RegisteredBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredBuffer")
            .field("name", &self.name)
            .field("dims", &self.dims)
            .field("ownership", &self.ownership())
            .finish()
    }
}

enum ViewKind {
    Resident(Arc<RegisteredBuffer>),
    Mapped(Mmap),
}

/// Result of [`Registry::load`]: a memory region plus its byte size
///
/// Hand it back through [`Registry::unmap`] (or drop it) once consumed.
pub struct MemoryView {
    name: String,
    dims: Dims,
    byte_size: usize,
    kind: ViewKind,
}

impl MemoryView {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dims the view was loaded with
    pub fn dims(&self) -> &Dims {
        &self.dims
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// True when the data comes from a file mapping rather than a resident entry
    pub fn is_mapped(&self) -> bool {
        matches!(self.kind, ViewKind::Mapped(_))
    }

    pub fn as_ptr(&self) -> *const u8 {
        match &self.kind {
            ViewKind::Resident(entry) => entry.as_ptr() as *const u8,
            ViewKind::Mapped(mmap) => mmap.as_ptr(),
        }
    }

    /// Raw bytes of the region.
    ///
    /// For Borrowed entries these are caller memory; the caller must not
    /// write to it while the view is in use.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.kind {
            ViewKind::Resident(entry) => {
                // SAFETY: byte_size was checked against the entry's dims in
                // `load`, and the entry is kept alive by the Arc.
                unsafe { std::slice::from_raw_parts(entry.as_ptr() as *const u8, self.byte_size) }
            }
            ViewKind::Mapped(mmap) => &mmap[..self.byte_size],
        }
    }

    /// Zero-copy element view; `None` if the region is misaligned
    pub fn as_elements(&self) -> Option<&[ComplexF32]> {
        bytemuck::try_cast_slice(self.as_bytes()).ok()
    }

    /// Copy of the elements (works for any alignment)
    pub fn to_elements(&self) -> Vec<ComplexF32> {
        bytemuck::pod_collect_to_vec(self.as_bytes())
    }
}

impl std::fmt::Debug for MemoryView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryView")
            .field("name", &self.name)
            .field("byte_size", &self.byte_size)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

#[derive(Default)]
struct RegistryState {
    buffers: AHashMap<String, Arc<RegisteredBuffer>>,
    reservations: ReservationTracker,
}

/// Name → buffer registry
pub struct Registry {
    state: Mutex<RegistryState>,
    allocator: Arc<dyn BufferAllocator>,
    options: RegistryOptions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl Registry {
    pub fn new(options: RegistryOptions) -> Self {
        Self::with_allocator(options, Arc::new(HeapAllocator))
    }

    pub fn with_allocator(options: RegistryOptions, allocator: Arc<dyn BufferAllocator>) -> Self {
        info!(
            "[REGISTRY] Initialised (max rank {}, fallback dir {:?})",
            options.max_rank, options.fallback_dir
        );
        Self {
            state: Mutex::new(RegistryState::default()),
            allocator,
            options,
        }
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().buffers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().buffers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn reserve_input(&self, name: &str) {
        self.state.lock().reservations.reserve_input(name);
        debug!("[REGISTRY] Reserved '{}' as input", name);
    }

    pub fn reserve_output(&self, name: &str) {
        self.state.lock().reservations.reserve_output(name);
        debug!("[REGISTRY] Reserved '{}' as output", name);
    }

    pub fn reservation(&self, name: &str) -> Option<ReservationRole> {
        self.state.lock().reservations.role(name)
    }

    /// Declared but not yet materialised
    pub fn is_pending(&self, name: &str) -> bool {
        let state = self.state.lock();
        state.reservations.is_reserved(name) && !state.buffers.contains_key(name)
    }

    /// Register caller memory under `name` (replacing any existing entry).
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `dims.element_count()`
    /// elements until the entry is unregistered or replaced and every view
    /// loaded from it has been unmapped.
    pub unsafe fn register_borrowed(
        &self,
        name: &str,
        dims: Dims,
        data: NonNull<ComplexF32>,
    ) -> Result<()> {
        let len = self.check_dims(&dims)?;
        self.insert(name, dims, Storage::Borrowed { ptr: data, len })
    }

    /// Register a block the registry takes ownership of. On error the block
    /// is handed to the allocator's `release`.
    pub fn register_owned(&self, name: &str, dims: Dims, block: Box<[ComplexF32]>) -> Result<()> {
        let actual = block.len();
        let storage = Storage::Owned(OwnedBlock::new(block, self.allocator.clone()));
        let expected = self.check_dims(&dims)?;
        if actual != expected {
            return Err(RegistryError::LengthMismatch { expected, actual });
        }
        self.insert(name, dims, storage)
    }

    /// Zeroed block sized for `dims`, from the registry's allocator
    pub fn allocate(&self, dims: &Dims) -> Result<Box<[ComplexF32]>> {
        let elements = self.check_dims(dims)?;
        Ok(self.allocator.allocate(elements))
    }

    /// Materialise an Owned output and return its data pointer for the engine
    /// to write through. The pointer stays valid until the name is
    /// unregistered or replaced and no view of it remains.
    pub fn create(&self, name: &str, dims: Dims) -> Result<NonNull<ComplexF32>> {
        let entry = self.create_entry(name, dims, |_| {})?;
        NonNull::new(entry.as_ptr()).ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Like [`Registry::create`], filling the block before it becomes visible
    pub fn create_with<F>(&self, name: &str, dims: Dims, fill: F) -> Result<()>
    where
        F: FnOnce(&mut [ComplexF32]),
    {
        self.create_entry(name, dims, fill).map(|_| ())
    }

    fn create_entry<F>(&self, name: &str, dims: Dims, fill: F) -> Result<Arc<RegisteredBuffer>>
    where
        F: FnOnce(&mut [ComplexF32]),
    {
        self.check_name(name)?;
        let mut block = self.allocate(&dims)?;
        fill(&mut block[..]);
        let storage = Storage::Owned(OwnedBlock::new(block, self.allocator.clone()));
        self.insert_entry(name, dims, storage)
    }

    /// Remove `name`. Missing names are a no-op; returns whether an entry existed.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            state.reservations.release(name);
            state.buffers.remove(name)
        };
        match removed {
            Some(entry) => {
                debug!(
                    "[REGISTRY] Unregistered '{}' ({} buffer)",
                    name,
                    entry.ownership()
                );
                true
            }
            None => {
                debug!("[REGISTRY] Unregister of unknown '{}' ignored", name);
                false
            }
        }
    }

    /// Unregister everything
    pub fn clear(&self) {
        let drained: Vec<Arc<RegisteredBuffer>> = {
            let mut state = self.state.lock();
            state.reservations.clear();
            state.buffers.drain().map(|(_, entry)| entry).collect()
        };
        if !drained.is_empty() {
            info!("[REGISTRY] Cleared {} buffers", drained.len());
        }
    }

    /// Resolve `name` to a memory region sized for `dims`.
    ///
    /// Resident entries win; otherwise `<fallback_dir>/<name>.cfl` is mapped.
    pub fn load(&self, name: &str, dims: &Dims) -> Result<MemoryView> {
        let byte_size = dims.byte_size()?;
        let entry = self.state.lock().buffers.get(name).cloned();

        if let Some(entry) = entry {
            if !entry.dims().same_shape(dims) {
                return Err(RegistryError::DimensionMismatch {
                    name: name.to_string(),
                    stored: entry.dims().clone(),
                    requested: dims.clone(),
                });
            }
            debug!("[REGISTRY] Loaded '{}' ({} bytes, resident)", name, byte_size);
            return Ok(MemoryView {
                name: name.to_string(),
                dims: dims.clone(),
                byte_size,
                kind: ViewKind::Resident(entry),
            });
        }

        let dir = self.fallback_dir_for(name)?;
        let mmap = cfl::map_data(dir, name, byte_size)?;
        debug!(
            "[REGISTRY] Loaded '{}' ({} bytes, mapped from {})",
            name,
            byte_size,
            dir.display()
        );
        Ok(MemoryView {
            name: name.to_string(),
            dims: dims.clone(),
            byte_size,
            kind: ViewKind::Mapped(mmap),
        })
    }

    /// Stored dimensions of `name` (resident entry or `.hdr` file)
    pub fn dims_of(&self, name: &str) -> Result<Dims> {
        if let Some(entry) = self.state.lock().buffers.get(name) {
            return Ok(entry.dims().clone());
        }
        let dir = self.fallback_dir_for(name)?;
        cfl::read_header(dir, name)
    }

    /// Release whatever `load` created for this view. Resident memory is
    /// untouched unless this was the last reference to an unregistered entry.
    pub fn unmap(&self, view: MemoryView) {
        debug!(
            "[REGISTRY] Unmapped '{}'{}",
            view.name,
            if view.is_mapped() { " (file mapping)" } else { "" }
        );
        drop(view);
    }

    /// Copy a view into an Owned entry under `name` and release the view,
    /// so a file mapping does not outlive the call. A resident view of the
    /// same name is only released.
    pub fn adopt(&self, name: &str, view: MemoryView) -> Result<()> {
        if !view.is_mapped() && view.name() == name {
            self.unmap(view);
            return Ok(());
        }
        let dims = view.dims().clone();
        let mut block = self.allocate(&dims)?;
        let target: &mut [u8] = bytemuck::cast_slice_mut(&mut block[..]);
        target.copy_from_slice(view.as_bytes());
        self.unmap(view);
        self.register_owned(name, dims, block)
    }

    fn fallback_dir_for(&self, name: &str) -> Result<&std::path::Path> {
        match self.options.fallback_dir.as_deref() {
            Some(dir) if cfl::exists(dir, name) => Ok(dir),
            _ => Err(RegistryError::NotFound(name.to_string())),
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        let reason = if name.is_empty() {
            Some("name is empty".to_string())
        } else if name.contains('\0') {
            Some("name contains a NUL byte".to_string())
        } else {
            match &self.options.required_suffix {
                Some(suffix) if !name.ends_with(suffix.as_str()) => {
                    Some(format!("name must end with '{}'", suffix))
                }
                _ => None,
            }
        };
        match reason {
            Some(reason) => Err(RegistryError::InvalidName {
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Rank and size checks; returns the element count
    fn check_dims(&self, dims: &Dims) -> Result<usize> {
        if dims.rank() > self.options.max_rank {
            return Err(RegistryError::RankTooLarge {
                rank: dims.rank(),
                max: self.options.max_rank,
            });
        }
        dims.byte_size()?;
        dims.element_count()
    }

    fn insert(&self, name: &str, dims: Dims, storage: Storage) -> Result<()> {
        self.check_name(name)?;
        self.insert_entry(name, dims, storage).map(|_| ())
    }

    fn insert_entry(
        &self,
        name: &str,
        dims: Dims,
        storage: Storage,
    ) -> Result<Arc<RegisteredBuffer>> {
        let ownership = storage.ownership();
        let entry = Arc::new(RegisteredBuffer {
            name: name.to_string(),
            dims,
            storage,
        });

        let previous = {
            let mut state = self.state.lock();
            state.reservations.consult(name, ownership);
            state.buffers.insert(name.to_string(), entry.clone())
        };

        match previous {
            Some(old) => {
                debug!(
                    "[REGISTRY] Replaced '{}' ({} -> {} buffer, dims {})",
                    name,
                    old.ownership(),
                    ownership,
                    entry.dims()
                );
            }
            None => debug!(
                "[REGISTRY] Registered '{}' ({} buffer, dims {})",
                name,
                ownership,
                entry.dims()
            ),
        }
        Ok(entry)
    }
}
