//! Runtime Module - Host Runtime Context
//!
//! Owns the weak registry together with the destruction marker it
//! consults, and drives the teardown sequence of an object:
//!
//! 1. `begin_destruction` - mark the object; new strict weak references
//!    to it are now fatal and lenient ones read as nil
//! 2. `finish_destruction` - null every weak variable pointing at it and
//!    drop the mark, inside one registry critical section
//!
//! `destroy` runs both steps back to back.

use crate::config::WeakTableConfig;
use crate::error::Result;
use crate::lifecycle::{DestroyingSet, DestructionMarker};
use crate::registry::WeakRegistry;
use std::sync::Arc;

/// Runtime - weak reference runtime context
pub struct Runtime {
    registry: WeakRegistry,
    destroying: Arc<DestroyingSet>,
}

impl Runtime {
    /// Create new runtime
    pub fn new(config: WeakTableConfig) -> Result<Self> {
        let destroying = Arc::new(DestroyingSet::new());
        let registry = WeakRegistry::with_marker(config, destroying.clone())?;
        Ok(Self {
            registry,
            destroying,
        })
    }

    /// Registry used by the write barrier
    pub fn registry(&self) -> &WeakRegistry {
        &self.registry
    }

    /// Whether `referent` is between begin and finish of destruction
    pub fn is_destroying(&self, referent: usize) -> bool {
        self.destroying.is_destroying(referent)
    }

    /// Number of objects between begin and finish of destruction
    pub fn destroying_count(&self) -> usize {
        self.destroying.len()
    }

    /// Mark `referent` as being destroyed
    ///
    /// Returns `false` if destruction had already begun.
    pub fn begin_destruction(&self, referent: usize) -> bool {
        if referent == 0 {
            return false;
        }
        // Marker lock nests inside the registry lock, as in `try_register`.
        let _table = self.registry.lock();
        self.destroying.begin(referent)
    }

    /// Clear every weak reference to `referent` and drop its mark
    ///
    /// Returns the number of weak variables nulled.
    pub fn finish_destruction(&self, referent: usize) -> usize {
        if referent == 0 {
            return 0;
        }
        let mut table = self.registry.lock();
        let nulled = table.clear(referent);
        self.destroying.finish(referent);
        nulled
    }

    /// Run the whole teardown sequence for `referent`
    pub fn destroy(&self, referent: usize) -> usize {
        self.begin_destruction(referent);
        self.finish_destruction(referent)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("destroying", &self.destroying.len())
            .finish()
    }
}
