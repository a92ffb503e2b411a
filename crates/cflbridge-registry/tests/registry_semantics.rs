// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Registry ownership and lifecycle tests

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cflbridge_registry::{
    cfl, BufferAllocator, ComplexF32, Dims, HeapAllocator, Ownership, Registry, RegistryError,
    RegistryOptions,
};
use tempfile::tempdir;

/// Allocation-tracking allocator
#[derive(Default)]
struct CountingAllocator {
    allocated: AtomicUsize,
    released: AtomicUsize,
    released_elements: AtomicUsize,
}

impl CountingAllocator {
    fn live(&self) -> usize {
        self.allocated.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
    }
}

impl BufferAllocator for CountingAllocator {
    fn allocate(&self, elements: usize) -> Box<[ComplexF32]> {
        self.allocated.fetch_add(1, Ordering::SeqCst);
        HeapAllocator.allocate(elements)
    }

    fn release(&self, block: Box<[ComplexF32]>) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.released_elements.fetch_add(block.len(), Ordering::SeqCst);
    }
}

fn counting_registry() -> (Registry, Arc<CountingAllocator>) {
    let allocator = Arc::new(CountingAllocator::default());
    let registry = Registry::with_allocator(RegistryOptions::default(), allocator.clone());
    (registry, allocator)
}

#[test]
fn replace_returns_second_buffer_only() {
    let registry = Registry::default();
    registry
        .create_with("n", Dims::from([4]), |d| d.fill(ComplexF32::new(1.0, 1.0)))
        .unwrap();
    registry
        .create_with("n", Dims::from([2, 3]), |d| d.fill(ComplexF32::new(2.0, -2.0)))
        .unwrap();

    assert_eq!(registry.len(), 1);
    let view = registry.load("n", &Dims::from([2, 3])).unwrap();
    assert_eq!(view.to_elements(), vec![ComplexF32::new(2.0, -2.0); 6]);
    assert!(registry.load("n", &Dims::from([4])).is_err());
}

#[test]
fn replacing_owned_releases_first_block() {
    let (registry, allocator) = counting_registry();
    registry.create("n", Dims::from([8])).unwrap();
    registry.create("n", Dims::from([3])).unwrap();

    assert_eq!(allocator.released.load(Ordering::SeqCst), 1);
    assert_eq!(allocator.released_elements.load(Ordering::SeqCst), 8);
    assert_eq!(allocator.live(), 1);

    registry.unregister("n");
    assert_eq!(allocator.live(), 0);
}

#[test]
fn borrowed_buffers_are_never_released() {
    let (registry, allocator) = counting_registry();
    let mut caller = vec![ComplexF32::new(3.0, 0.0); 4];
    let ptr = NonNull::new(caller.as_mut_ptr()).unwrap();

    unsafe { registry.register_borrowed("b", Dims::from([4]), ptr) }.unwrap();
    unsafe { registry.register_borrowed("b", Dims::from([2, 2]), ptr) }.unwrap();
    registry.unregister("b");

    assert_eq!(allocator.released.load(Ordering::SeqCst), 0);
    assert_eq!(caller, vec![ComplexF32::new(3.0, 0.0); 4]);
}

#[test]
fn owned_replaced_by_borrowed_is_released_once() {
    let (registry, allocator) = counting_registry();
    let mut caller = vec![ComplexF32::ZERO; 2];
    registry.create("x", Dims::from([2])).unwrap();

    let ptr = NonNull::new(caller.as_mut_ptr()).unwrap();
    unsafe { registry.register_borrowed("x", Dims::from([2]), ptr) }.unwrap();

    assert_eq!(allocator.released.load(Ordering::SeqCst), 1);
    registry.unregister("x");
    assert_eq!(allocator.released.load(Ordering::SeqCst), 1);
}

#[test]
fn unregister_missing_is_noop() {
    let registry = Registry::default();
    registry.create("kept", Dims::from([1])).unwrap();

    assert!(!registry.unregister("never-registered"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn view_outlives_unregister() {
    let (registry, allocator) = counting_registry();
    registry
        .create_with("live", Dims::from([2]), |d| d.fill(ComplexF32::new(5.0, 6.0)))
        .unwrap();

    let view = registry.load("live", &Dims::from([2])).unwrap();
    registry.unregister("live");

    assert!(!registry.exists("live"));
    assert_eq!(allocator.released.load(Ordering::SeqCst), 0);
    assert_eq!(view.to_elements(), vec![ComplexF32::new(5.0, 6.0); 2]);

    registry.unmap(view);
    assert_eq!(allocator.released.load(Ordering::SeqCst), 1);
}

#[test]
fn file_fallback_maps_and_adopts() {
    let dir = tempdir().unwrap();
    let dims = Dims::from([2, 2]);
    let data: Vec<ComplexF32> = (0..4).map(|i| ComplexF32::new(i as f32, 0.5)).collect();
    cfl::write(dir.path(), "disk", &dims, &data).unwrap();

    let registry = Registry::new(RegistryOptions {
        fallback_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    assert!(!registry.exists("disk"));
    assert_eq!(registry.dims_of("disk").unwrap(), dims);

    let view = registry.load("disk", &dims).unwrap();
    assert!(view.is_mapped());
    assert_eq!(view.to_elements(), data);

    registry.adopt("disk", view).unwrap();
    let entry_view = registry.load("disk", &dims).unwrap();
    assert!(!entry_view.is_mapped());
    assert_eq!(entry_view.to_elements(), data);
}

#[test]
fn file_fallback_rejects_short_file() {
    let dir = tempdir().unwrap();
    cfl::write(dir.path(), "small", &Dims::from([2]), &[ComplexF32::ZERO; 2]).unwrap();

    let registry = Registry::new(RegistryOptions {
        fallback_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });

    assert!(matches!(
        registry.load("small", &Dims::from([4])),
        Err(RegistryError::FileTooSmall { expected: 32, actual: 16, .. })
    ));
}

#[test]
fn ownership_is_reported() {
    let registry = Registry::default();
    let mut caller = vec![ComplexF32::ZERO; 1];
    let ptr = NonNull::new(caller.as_mut_ptr()).unwrap();
    unsafe { registry.register_borrowed("in", Dims::from([1]), ptr) }.unwrap();
    registry.create("out", Dims::from([1])).unwrap();

    let registry_view = registry.load("in", &Dims::from([1])).unwrap();
    assert_eq!(registry_view.as_ptr(), caller.as_ptr() as *const u8);
    assert_eq!(
        registry.reservation("in"),
        Some(cflbridge_registry::ReservationRole::implied_by(Ownership::Borrowed))
    );
}

#[test]
fn concurrent_replace_and_load_see_whole_buffers() {
    const WRITERS: usize = 3;
    const READERS: usize = 3;
    const ROUNDS: usize = 200;
    let dims = Dims::from([64]);

    // Borrowed sources outlive the registry's use of them (cleared below)
    let borrowed: Vec<Vec<ComplexF32>> = (0..WRITERS)
        .map(|k| vec![ComplexF32::new(100.0 + k as f32, 1.0); 64])
        .collect();
    let (registry, allocator) = counting_registry();

    std::thread::scope(|scope| {
        for (k, source) in borrowed.iter().enumerate() {
            let (registry, dims) = (&registry, &dims);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    if round % 2 == 0 {
                        let value = ComplexF32::new(k as f32, -(k as f32));
                        registry
                            .create_with("shared", dims.clone(), |d| d.fill(value))
                            .unwrap();
                    } else {
                        let data = NonNull::from(&source[..]).cast::<ComplexF32>();
                        unsafe {
                            registry
                                .register_borrowed("shared", dims.clone(), data)
                                .unwrap()
                        };
                    }
                }
            });
        }

        for r in 0..READERS {
            let (registry, dims) = (&registry, &dims);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    if let Ok(view) = registry.load("shared", dims) {
                        let elements = view.to_elements();
                        assert_eq!(elements.len(), 64);
                        assert!(
                            elements.iter().all(|e| *e == elements[0]),
                            "view mixes two registrations"
                        );
                        if round % 7 == r {
                            // view keeps its entry alive past the unregister
                            registry.unregister("shared");
                            assert_eq!(view.to_elements(), elements);
                        }
                        registry.unmap(view);
                    }
                }
            });
        }
    });

    assert!(registry.len() <= 1);
    registry.clear();
    assert_eq!(allocator.live(), 0);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Create(u8, usize),
        Unregister(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, 1usize..5).prop_map(|(n, len)| Op::Create(n, len)),
            (0u8..4).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_entry_per_name(ops in proptest::collection::vec(op(), 0..40)) {
            let (registry, allocator) = counting_registry();
            let mut model = std::collections::BTreeMap::new();

            for op in ops {
                match op {
                    Op::Create(n, len) => {
                        let name = format!("n{}", n);
                        registry.create(&name, Dims::from([len])).unwrap();
                        model.insert(name, len);
                    }
                    Op::Unregister(n) => {
                        let name = format!("n{}", n);
                        registry.unregister(&name);
                        model.remove(&name);
                    }
                }
            }

            prop_assert_eq!(registry.len(), model.len());
            prop_assert_eq!(allocator.live(), model.len());
            for (name, len) in &model {
                prop_assert_eq!(registry.dims_of(name).unwrap(), Dims::from([*len]));
            }
        }
    }
}
