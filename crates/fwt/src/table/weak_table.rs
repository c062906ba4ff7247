//! Weak Table - Referent to Referrer Map
//!
//! The unlocked core of the registry. Every method assumes the caller holds
//! the registry lock; `WeakRegistry` is the only way to reach a shared
//! `WeakTable`.
//!
//! Events are never emitted from here. They queue up in the table and are
//! handed to the logger once the registry lock is released, so no log sink
//! runs inside a critical section.

use super::{ProbeTable, Removal, Slot, WeakEntry};
use crate::error::Result;
use crate::logging::{WeakEvent, WeakLogger};
use crate::pointer::{self, DisguisedPtr};
use crate::stats::WeakStats;
use std::sync::Arc;

impl Slot for Option<WeakEntry> {
    fn vacant() -> Self {
        None
    }

    fn key(&self) -> Option<DisguisedPtr> {
        self.as_ref().map(WeakEntry::key)
    }
}

/// WeakTable - one entry per weakly referenced object
pub struct WeakTable {
    entries: ProbeTable<Option<WeakEntry>>,
    stats: Arc<WeakStats>,
    logger: Arc<WeakLogger>,
    pending: Vec<WeakEvent>,
}

impl WeakTable {
    /// Standalone table with its own stats and a disabled logger
    ///
    /// Warnings still queue up; drain them with
    /// [`take_events`](Self::take_events).
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_parts(
            capacity,
            Arc::new(WeakStats::new()),
            Arc::new(WeakLogger::disabled()),
        )
    }

    pub(crate) fn with_parts(
        capacity: usize,
        stats: Arc<WeakStats>,
        logger: Arc<WeakLogger>,
    ) -> Result<Self> {
        Ok(Self {
            entries: ProbeTable::with_capacity("weak table", capacity)?,
            stats,
            logger,
            pending: Vec::new(),
        })
    }

    /// Number of referents with at least one weak reference
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entry slots
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn max_probe_distance(&self) -> usize {
        self.entries.max_probe_distance()
    }

    pub fn stats(&self) -> &Arc<WeakStats> {
        &self.stats
    }

    /// Entry for `referent`, if it has any weak references
    pub fn entry(&self, referent: usize) -> Option<&WeakEntry> {
        let index = self.entries.find(DisguisedPtr::encode(referent))?;
        self.entries.slots()[index].as_ref()
    }

    /// Addresses of every referent with an entry
    pub fn referents(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .slots()
            .iter()
            .flatten()
            .map(WeakEntry::referent)
    }

    /// Events queued since the last drain, oldest first
    pub fn take_events(&mut self) -> Vec<WeakEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Queue an event for emission after the lock is released
    ///
    /// Events the logger would drop are not queued.
    pub(crate) fn defer(&mut self, event: WeakEvent) {
        if self.logger.should_emit(event.level()) {
            self.pending.push(event);
        }
    }

    /// Record that the weak variable at `location` points to `referent`
    ///
    /// Returns `true` if a new binding was created, `false` for a duplicate
    /// or for a null referent or unusable location.
    ///
    /// # Safety
    /// `location` must stay valid for reads and writes of a pointer until it
    /// is unregistered or `referent` is cleared.
    pub unsafe fn register(&mut self, referent: usize, location: usize) -> Result<bool> {
        if referent == 0 || !pointer::is_valid_location(location) {
            return Ok(false);
        }

        let key = DisguisedPtr::encode(referent);
        let disguised = DisguisedPtr::encode(location);

        if let Some(index) = self.entries.find(key) {
            let (created, event) = match self.entries.get_mut(index) {
                Some(entry) => insert_referrer(&self.stats, entry, disguised)?,
                None => (false, None),
            };
            if let Some(event) = event {
                self.defer(event);
            }
            self.stats.record_registration(created);
            return Ok(created);
        }

        let before = self.entries.capacity();
        self.entries
            .insert_absent(Some(WeakEntry::new(key, disguised)))?;
        let after = self.entries.capacity();
        if after != before {
            self.stats.record_table_growth();
            self.defer(WeakEvent::TableGrown {
                from: before,
                to: after,
                entries: self.entries.len(),
            });
        }

        self.stats.record_registration(true);
        Ok(true)
    }

    /// Remove the binding of `location` to `referent`
    ///
    /// Unknown pairs are ignored. The entry is dropped once its last
    /// referrer is gone. Returns whether a binding was removed.
    pub fn unregister(&mut self, referent: usize, location: usize) -> bool {
        let removed = self.remove_binding(referent, location);
        self.stats.record_unregistration(removed);
        removed
    }

    fn remove_binding(&mut self, referent: usize, location: usize) -> bool {
        if referent == 0 || location == 0 {
            return false;
        }

        let Some(index) = self.entries.find(DisguisedPtr::encode(referent)) else {
            return false;
        };
        let removal = match self.entries.get_mut(index) {
            Some(entry) => entry.remove(DisguisedPtr::encode(location)),
            None => Removal::Missing,
        };

        match removal {
            Removal::Missing => false,
            Removal::Removed => true,
            Removal::Emptied => {
                self.entries.take(index);
                true
            },
        }
    }

    /// Whether `referent` has at least one weak reference
    pub fn is_registered(&self, referent: usize) -> bool {
        referent != 0 && self.entries.find(DisguisedPtr::encode(referent)).is_some()
    }

    /// Null every weak variable pointing at `referent` and drop its entry
    ///
    /// Returns the number of weak variables nulled. A referent without an
    /// entry costs one lookup.
    pub fn clear(&mut self, referent: usize) -> usize {
        if referent == 0 {
            return 0;
        }

        let key = DisguisedPtr::encode(referent);
        let taken = self
            .entries
            .find(key)
            .and_then(|index| self.entries.take(index));
        let Some(mut entry) = taken else {
            self.stats.record_empty_clear();
            return 0;
        };

        let mut misused = Vec::new();
        // SAFETY: every location in the entry was registered through
        // `register`, whose contract keeps it valid until it is unregistered
        // or its referent is cleared. Clearing happens here, exactly once.
        let nulled = unsafe {
            entry.clear_all(|location, found| misused.push((location, found)))
        };

        self.stats.record_clear(nulled, misused.len());
        for (location, found) in misused {
            self.defer(WeakEvent::MisusedReferrer {
                location: DisguisedPtr::encode(location),
                referent: key,
                found: DisguisedPtr::encode(found),
            });
        }
        self.defer(WeakEvent::ReferentCleared {
            referent: key,
            nulled,
        });
        nulled
    }
}

/// Add a referrer to an existing entry
///
/// Returns whether a binding was created, and the promotion or growth event
/// it caused, if any.
fn insert_referrer(
    stats: &WeakStats,
    entry: &mut WeakEntry,
    location: DisguisedPtr,
) -> Result<(bool, Option<WeakEvent>)> {
    let was_out_of_line = entry.is_out_of_line();
    let before = entry.capacity();

    let created = entry.insert(location)?;

    let event = if !was_out_of_line && entry.is_out_of_line() {
        stats.record_promotion();
        Some(WeakEvent::EntryPromoted {
            referent: entry.key(),
            referrers: entry.len(),
        })
    } else if was_out_of_line && entry.capacity() != before {
        stats.record_entry_growth();
        Some(WeakEvent::EntryGrown {
            referent: entry.key(),
            from: before,
            to: entry.capacity(),
        })
    } else {
        None
    };

    Ok((created, event))
}

impl std::fmt::Debug for WeakTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakTable")
            .field("entries", &self.entries.len())
            .field("capacity", &self.entries.capacity())
            .field("max_probe_distance", &self.entries.max_probe_distance())
            .field("pending_events", &self.pending.len())
            .finish()
    }
}
