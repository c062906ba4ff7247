//! Registry Module - Locked Weak Reference Registry
//!
//! `WeakRegistry` is the shared face of a [`WeakTable`]: one
//! `parking_lot::Mutex` guards the table, every entry and all growth, and
//! the destruction marker is consulted under that same lock so a referent
//! cannot start dying between the check and the insertion.
//!
//! Every access goes through a [`WeakTableGuard`]. Events the table queued
//! while locked are handed to the logger after the mutex is released.
//!
//! Fatal conditions (strict registration to a dying referent, exhausted
//! memory) never return to the caller of the infallible operations. They are
//! logged at `error` and then panic or abort according to
//! [`FatalAction`].

use crate::config::{FatalAction, WeakTableConfig};
use crate::error::{Result, WeakError};
use crate::lifecycle::{DestructionMarker, NeverDestroying};
use crate::logging::{WeakEvent, WeakLogger};
use crate::pointer::DisguisedPtr;
use crate::stats::{WeakMetrics, WeakStats};
use crate::table::WeakTable;
use parking_lot::{Mutex, MutexGuard};
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// WeakRegistry - process-wide store of weak references
///
/// # Examples
///
/// ```rust
/// use fwt::{WeakRegistry, WeakTableConfig};
///
/// let registry = WeakRegistry::new(WeakTableConfig::default()).unwrap();
///
/// let object = Box::new(42u64);
/// let referent = &*object as *const u64 as usize;
/// let mut weak: usize = referent;
///
/// unsafe {
///     assert!(registry.register(referent, &mut weak as *mut usize as usize, true));
/// }
/// assert!(registry.is_registered(referent));
///
/// assert_eq!(registry.clear(referent), 1);
/// assert_eq!(weak, 0);
/// ```
pub struct WeakRegistry {
    table: Mutex<WeakTable>,
    marker: Arc<dyn DestructionMarker>,
    stats: Arc<WeakStats>,
    logger: Arc<WeakLogger>,
    config: WeakTableConfig,
}

impl WeakRegistry {
    /// Create a registry whose referents are never reported as dying
    pub fn new(config: WeakTableConfig) -> Result<Self> {
        Self::with_marker(config, Arc::new(NeverDestroying))
    }

    /// Create a registry that consults `marker` on every registration
    pub fn with_marker(
        config: WeakTableConfig,
        marker: Arc<dyn DestructionMarker>,
    ) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(WeakStats::new());
        let logger = Arc::new(WeakLogger::new(config.logger_config()));
        let table = WeakTable::with_parts(
            config.initial_capacity,
            Arc::clone(&stats),
            Arc::clone(&logger),
        )?;

        log::debug!(
            "weak registry initialized: capacity={}, fatal_action={:?}",
            config.initial_capacity,
            config.fatal_action
        );

        Ok(Self {
            table: Mutex::new(table),
            marker,
            stats,
            logger,
            config,
        })
    }

    /// Bind the weak variable at `location` to `referent`
    ///
    /// Returns `true` if a new binding was created. Duplicates, null
    /// referents and unusable locations return `false`, as does a lenient
    /// registration (`crash_if_destroying == false`) to a dying referent;
    /// the caller should then treat the weak variable as nil.
    ///
    /// A strict registration to a dying referent is fatal.
    ///
    /// # Safety
    /// `location` must stay valid for reads and writes of a pointer until it
    /// is unregistered or `referent` is cleared.
    pub unsafe fn register(
        &self,
        referent: usize,
        location: usize,
        crash_if_destroying: bool,
    ) -> bool {
        match self.try_register(referent, location, crash_if_destroying) {
            Ok(created) => created,
            Err(err) => self.fatal(err),
        }
    }

    /// Fallible form of [`register`](Self::register)
    ///
    /// # Safety
    /// Same contract as [`register`](Self::register).
    pub unsafe fn try_register(
        &self,
        referent: usize,
        location: usize,
        crash_if_destroying: bool,
    ) -> Result<bool> {
        let mut table = self.lock();

        if referent != 0 && self.marker.is_destroying(referent) {
            self.stats.record_rejection();
            table.defer(WeakEvent::RegistrationRejected {
                referent: DisguisedPtr::encode(referent),
                location: DisguisedPtr::encode(location),
                strict: crash_if_destroying,
            });
            return if crash_if_destroying {
                Err(WeakError::ReferentDestroying { referent, location })
            } else {
                Ok(false)
            };
        }

        table.register(referent, location)
    }

    /// Remove the binding of `location` to `referent`, if any
    pub fn unregister(&self, referent: usize, location: usize) -> bool {
        self.lock().unregister(referent, location)
    }

    /// Null every weak variable pointing at `referent` and forget it
    ///
    /// Returns the number of weak variables nulled.
    pub fn clear(&self, referent: usize) -> usize {
        self.lock().clear(referent)
    }

    /// Whether `referent` has at least one weak reference
    pub fn is_registered(&self, referent: usize) -> bool {
        self.lock().is_registered(referent)
    }

    /// Lock the registry for a sequence of table operations
    ///
    /// The destruction marker is not consulted by `WeakTable::register`;
    /// callers holding the guard are expected to be the lifecycle side.
    pub fn lock(&self) -> WeakTableGuard<'_> {
        WeakTableGuard {
            table: ManuallyDrop::new(self.table.lock()),
            logger: &self.logger,
        }
    }

    /// Number of referents with at least one weak reference
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> &Arc<WeakStats> {
        &self.stats
    }

    pub fn logger(&self) -> &Arc<WeakLogger> {
        &self.logger
    }

    pub fn config(&self) -> &WeakTableConfig {
        &self.config
    }

    /// Snapshot of counters and table shape for export
    pub fn metrics(&self) -> WeakMetrics {
        let (entries, capacity) = {
            let table = self.lock();
            (table.len(), table.capacity())
        };
        WeakMetrics::from_summary(&self.stats.summary(), entries, capacity)
    }

    fn fatal(&self, err: WeakError) -> ! {
        log::error!(target: "fwt", "fatal weak table error: {}", err);
        match self.config.fatal_action {
            FatalAction::Panic => panic!("fwt: {}", err),
            FatalAction::Abort => std::process::abort(),
        }
    }
}

impl std::fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("table", &*self.lock())
            .field("config", &self.config)
            .finish()
    }
}

/// Exclusive access to a registry's [`WeakTable`]
///
/// Dropping the guard unlocks the registry first and then logs the events
/// queued while it was held.
pub struct WeakTableGuard<'a> {
    table: ManuallyDrop<MutexGuard<'a, WeakTable>>,
    logger: &'a WeakLogger,
}

impl Deref for WeakTableGuard<'_> {
    type Target = WeakTable;

    fn deref(&self) -> &WeakTable {
        &self.table
    }
}

impl DerefMut for WeakTableGuard<'_> {
    fn deref_mut(&mut self) -> &mut WeakTable {
        &mut self.table
    }
}

impl Drop for WeakTableGuard<'_> {
    fn drop(&mut self) {
        let events = self.table.take_events();
        // SAFETY: the guard is dropped exactly once, here, and never touched
        // again.
        unsafe { ManuallyDrop::drop(&mut self.table) };
        for event in events {
            self.logger.log(event);
        }
    }
}
