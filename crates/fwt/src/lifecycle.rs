//! Lifecycle Module - Object Destruction Marker
//!
//! The registry never decides on its own whether an object is dying. It
//! asks a `DestructionMarker` supplied by the host, while holding the
//! registry lock, every time a weak reference is about to be formed.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Source of truth for "this object has started its destruction"
pub trait DestructionMarker: Send + Sync {
    /// Whether `referent` is being destroyed
    fn is_destroying(&self, referent: usize) -> bool;
}

/// Marker for hosts that never form weak references during teardown
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDestroying;

impl DestructionMarker for NeverDestroying {
    fn is_destroying(&self, _referent: usize) -> bool {
        false
    }
}

impl<F> DestructionMarker for F
where
    F: Fn(usize) -> bool + Send + Sync,
{
    fn is_destroying(&self, referent: usize) -> bool {
        self(referent)
    }
}

/// DestroyingSet - set of referents between `begin` and `finish`
#[derive(Debug, Default)]
pub struct DestroyingSet {
    referents: Mutex<FxHashSet<usize>>,
}

impl DestroyingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `referent` as being destroyed
    ///
    /// Returns `false` if it was already marked.
    pub fn begin(&self, referent: usize) -> bool {
        self.referents.lock().insert(referent)
    }

    /// Remove the mark, returning whether it was present
    pub fn finish(&self, referent: usize) -> bool {
        self.referents.lock().remove(&referent)
    }

    pub fn len(&self) -> usize {
        self.referents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.referents.lock().is_empty()
    }
}

impl DestructionMarker for DestroyingSet {
    fn is_destroying(&self, referent: usize) -> bool {
        self.referents.lock().contains(&referent)
    }
}
