//! Test Utilities for the FWT Test Suite
//!
//! Weak variables in these tests are real pointer-sized memory cells, so
//! every assertion about clearing checks actual memory contents, not table
//! bookkeeping.

#![allow(dead_code)]

use fwt::{DestroyingSet, WeakRegistry, WeakTableConfig};
use std::cell::UnsafeCell;
use std::sync::Arc;

/// Base address for fabricated referents
///
/// The registry never dereferences a referent, so tests use distinct,
/// aligned fake addresses instead of allocating objects.
pub const REFERENT_BASE: usize = 0x10_0000_0000;

/// Spacing between fabricated referents
pub const REFERENT_STRIDE: usize = 64;

/// Fabricated referent address number `n`
pub fn referent(n: usize) -> usize {
    REFERENT_BASE + n * REFERENT_STRIDE
}

/// ============================================================================
/// WEAK VARIABLES
/// ============================================================================

/// A fixed block of weak variables at stable heap addresses
pub struct WeakSlots {
    cells: Box<[UnsafeCell<usize>]>,
}

impl WeakSlots {
    /// `count` weak variables, all null
    pub fn new(count: usize) -> Self {
        Self {
            cells: (0..count).map(|_| UnsafeCell::new(0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Address of weak variable `index`, as registered with the table
    pub fn location(&self, index: usize) -> usize {
        self.cells[index].get() as usize
    }

    /// Current value of weak variable `index`
    pub fn get(&self, index: usize) -> usize {
        unsafe { self.cells[index].get().read_volatile() }
    }

    /// Store into weak variable `index` without telling the table
    pub fn set(&self, index: usize, value: usize) {
        unsafe { self.cells[index].get().write_volatile(value) }
    }

    /// Indices of all non-null weak variables
    pub fn non_null(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.get(i) != 0).collect()
    }
}

/// ============================================================================
/// REGISTRY FIXTURE
/// ============================================================================

/// Test fixture for registry operations
pub struct RegistryFixture {
    pub registry: Arc<WeakRegistry>,
    pub destroying: Arc<DestroyingSet>,
    pub config: WeakTableConfig,
}

impl RegistryFixture {
    /// Create fixture with default configuration
    ///
    /// **Bug this finds:** Configuration validation bugs, initialization failures
    pub fn with_defaults() -> Self {
        Self::with_config(WeakTableConfig::default())
    }

    /// Create fixture with a small registry table so growth happens early
    ///
    /// **Bug this finds:** Entries lost or duplicated by rehashing
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self::with_config(WeakTableConfig {
            initial_capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: WeakTableConfig) -> Self {
        let destroying = Arc::new(DestroyingSet::new());
        let registry = Arc::new(
            WeakRegistry::with_marker(config.clone(), destroying.clone())
                .expect("registry initialization should succeed with valid config"),
        );
        Self {
            registry,
            destroying,
            config,
        }
    }

    /// Write barrier: store `referent` into weak variable `index` and
    /// register it, as compiled code does for a strong store to a weak var
    pub fn store(&self, slots: &WeakSlots, index: usize, referent: usize) -> bool {
        let old = slots.get(index);
        if old != 0 {
            self.registry.unregister(old, slots.location(index));
        }
        slots.set(index, referent);
        unsafe { self.registry.register(referent, slots.location(index), true) }
    }

    /// Write barrier: null weak variable `index` and unregister it
    pub fn store_null(&self, slots: &WeakSlots, index: usize) -> bool {
        let old = slots.get(index);
        slots.set(index, 0);
        old != 0 && self.registry.unregister(old, slots.location(index))
    }

    /// Number of referrers recorded for `referent`
    pub fn referrer_count(&self, referent: usize) -> usize {
        self.registry
            .lock()
            .entry(referent)
            .map_or(0, |entry| entry.len())
    }

    /// Whether the entry for `referent` uses out-of-line storage
    pub fn is_out_of_line(&self, referent: usize) -> bool {
        self.registry
            .lock()
            .entry(referent)
            .is_some_and(|entry| entry.is_out_of_line())
    }
}

/// ============================================================================
/// ASSERTIONS
/// ============================================================================

/// Assert every weak variable in `slots` is null
pub fn assert_all_null(slots: &WeakSlots) {
    let dangling = slots.non_null();
    assert!(
        dangling.is_empty(),
        "weak variables {:?} still hold a referent after clear",
        dangling
    );
}

/// Assert the registry has no entries left
pub fn assert_registry_empty(registry: &WeakRegistry) {
    let table = registry.lock();
    let leftover: Vec<usize> = table.referents().collect();
    assert!(
        leftover.is_empty(),
        "registry still holds entries for {:x?}",
        leftover
    );
}
