//! Table Module - Open-Addressed Weak Reference Storage
//!
//! Two levels of hash table, both built on [`ProbeTable`]:
//!
//! - the registry table ([`WeakTable`]), keyed by referent, one
//!   [`WeakEntry`] per weakly referenced object
//! - the out-of-line referrer set inside a [`WeakEntry`], keyed by the
//!   address of each weak variable
//!
//! # Probing
//!
//! Linear probing over a power-of-two slot array. Every insertion records
//! its displacement from the home slot and the table remembers the largest
//! one seen. Lookups scan exactly that many slots past home and stop, so an
//! empty slot is never a chain terminator and removal can simply vacate a
//! slot without tombstones or backward shifting.
//!
//! # Growth
//!
//! Capacity doubles when an insertion would push the load factor past 3/4.
//! Every occupied slot is re-probed into the new array from scratch.
//! Tables never shrink.

pub mod entry;
pub mod weak_table;

pub use entry::{Removal, WeakEntry, INLINE_CAPACITY};
pub use weak_table::WeakTable;

use crate::error::{Result, WeakError};
use crate::pointer::DisguisedPtr;
use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Capacity used when growing a table that has no slots yet
pub(crate) const MIN_GROW_CAPACITY: usize = 8;

/// Load factor limit, as numerator / denominator
const MAX_LOAD_NUMERATOR: usize = 3;
const MAX_LOAD_DENOMINATOR: usize = 4;

/// A slot of a [`ProbeTable`]
pub(crate) trait Slot {
    /// The unoccupied value
    fn vacant() -> Self;

    /// Key of an occupied slot, `None` when vacant
    fn key(&self) -> Option<DisguisedPtr>;
}

impl Slot for DisguisedPtr {
    fn vacant() -> Self {
        DisguisedPtr::NULL
    }

    fn key(&self) -> Option<DisguisedPtr> {
        if self.is_null() {
            None
        } else {
            Some(*self)
        }
    }
}

/// Home slot hash for a disguised key
#[inline]
pub(crate) fn hash_pointer(key: DisguisedPtr) -> usize {
    let mut hasher = FxHasher::default();
    hasher.write_usize(key.bits());
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as usize
}

/// Open-addressed slot array with max-displacement bounded lookups
#[derive(Debug)]
pub(crate) struct ProbeTable<S> {
    slots: Vec<S>,
    count: usize,
    max_probe_distance: usize,
    name: &'static str,
}

impl<S: Slot> ProbeTable<S> {
    /// Table with `capacity` vacant slots
    ///
    /// `capacity` must be a power of two.
    pub(crate) fn with_capacity(name: &'static str, capacity: usize) -> Result<Self> {
        debug_assert!(capacity.is_power_of_two());
        Ok(Self {
            slots: allocate_slots(name, capacity)?,
            count: 0,
            max_probe_distance: 0,
            name,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn max_probe_distance(&self) -> usize {
        self.max_probe_distance
    }

    /// Raw slot array, vacant slots included
    pub(crate) fn slots(&self) -> &[S] {
        &self.slots
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> &mut S {
        &mut self.slots[index]
    }

    /// Index of the slot holding `key`
    pub(crate) fn find(&self, key: DisguisedPtr) -> Option<usize> {
        if self.slots.is_empty() || key.is_null() {
            return None;
        }

        let mask = self.slots.len() - 1;
        let home = hash_pointer(key) & mask;
        (0..=self.max_probe_distance)
            .map(|distance| (home + distance) & mask)
            .find(|&index| self.slots[index].key() == Some(key))
    }

    /// Whether one more insertion would exceed the load factor
    pub(crate) fn needs_growth(&self) -> bool {
        (self.count + 1) * MAX_LOAD_DENOMINATOR > self.slots.len() * MAX_LOAD_NUMERATOR
    }

    /// Insert a slot whose key is known to be absent
    ///
    /// Grows first when needed. Returns the index the slot landed in.
    pub(crate) fn insert_absent(&mut self, slot: S) -> Result<usize> {
        debug_assert!(slot.key().map_or(true, |key| self.find(key).is_none()));
        if self.needs_growth() {
            self.grow()?;
        }
        self.place(slot)
    }

    /// Vacate a slot, returning its previous content
    pub(crate) fn take(&mut self, index: usize) -> S {
        let slot = std::mem::replace(&mut self.slots[index], S::vacant());
        if slot.key().is_some() {
            self.count -= 1;
        }
        slot
    }

    /// Double the capacity and re-probe every occupied slot
    pub(crate) fn grow(&mut self) -> Result<()> {
        let new_capacity = if self.slots.is_empty() {
            MIN_GROW_CAPACITY
        } else {
            self.slots
                .len()
                .checked_mul(2)
                .ok_or(WeakError::TableExhausted {
                    table: self.name,
                    requested: usize::MAX,
                })?
        };

        let old = std::mem::replace(&mut self.slots, allocate_slots(self.name, new_capacity)?);
        self.count = 0;
        self.max_probe_distance = 0;
        for slot in old {
            if slot.key().is_some() {
                self.place(slot)?;
            }
        }
        Ok(())
    }

    fn place(&mut self, slot: S) -> Result<usize> {
        let key = slot
            .key()
            .ok_or_else(|| WeakError::Internal(format!("vacant slot inserted into {}", self.name)))?;

        let mask = self.slots.len() - 1;
        let home = hash_pointer(key) & mask;
        for distance in 0..self.slots.len() {
            let index = (home + distance) & mask;
            if self.slots[index].key().is_none() {
                self.slots[index] = slot;
                self.count += 1;
                self.max_probe_distance = self.max_probe_distance.max(distance);
                return Ok(index);
            }
        }

        Err(WeakError::Internal(format!(
            "{} has no free slot ({} of {} occupied)",
            self.name,
            self.count,
            self.slots.len()
        )))
    }
}

fn allocate_slots<S: Slot>(table: &'static str, capacity: usize) -> Result<Vec<S>> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| WeakError::TableExhausted {
            table,
            requested: capacity,
        })?;
    slots.resize_with(capacity, S::vacant);
    Ok(slots)
}
