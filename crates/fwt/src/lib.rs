//! # FWT - Fax Weak Reference Table
//!
//! FWT tracks every weak variable in a process and nulls them all, in one
//! step, when the object they point at is destroyed. A program never
//! observes a dangling weak reference.
//!
//! ## Overview
//!
//! - **Registry**: one hash table keyed by object address, one entry per
//!   object that has at least one weak reference
//! - **Inline Referrers**: an entry stores up to four weak-variable
//!   addresses inline and moves to an out-of-line hash set on the fifth
//! - **Disguised Pointers**: every stored address is negated so memory
//!   scanners do not see the table as references into the heap
//! - **Single Lock**: one mutex guards the whole table, the destruction
//!   check included
//!
//! ## Quick Start
//!
//! ```rust
//! use fwt::{WeakRegistry, WeakTableConfig};
//!
//! fn main() -> Result<(), fwt::WeakError> {
//!     let registry = WeakRegistry::new(WeakTableConfig::default())?;
//!
//!     let object = Box::new([0u64; 4]);
//!     let referent = object.as_ptr() as usize;
//!
//!     // A weak variable is any pointer-sized slot holding the referent
//!     let mut weak: usize = referent;
//!     let location = &mut weak as *mut usize as usize;
//!
//!     // Write barrier: record the binding
//!     unsafe {
//!         registry.register(referent, location, true);
//!     }
//!
//!     // Object teardown: every weak variable becomes null
//!     registry.clear(referent);
//!     drop(object);
//!
//!     assert_eq!(weak, 0);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Write barrier            Object lifecycle               │
//! │  register / unregister    begin_destruction / clear      │
//! └───────────────┬──────────────────────┬───────────────────┘
//!                 │                      │
//!                 ▼                      ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  WeakRegistry (parking_lot::Mutex)                       │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │  WeakTable: open-addressed, keyed by -referent     │  │
//! │  │  ┌──────────────┐ ┌──────────────┐                 │  │
//! │  │  │ WeakEntry    │ │ WeakEntry    │   ...           │  │
//! │  │  │ [-loc; 4]    │ │ set of -loc  │                 │  │
//! │  │  └──────────────┘ └──────────────┘                 │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │  DestructionMarker (consulted under the lock)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Weak Reference Lifecycle
//!
//! 1. **Store**: the write barrier unregisters the old referent of a weak
//!    variable and registers the new one
//! 2. **Promote**: the fifth distinct weak variable moves an entry out of line
//! 3. **Begin destruction**: the lifecycle side marks the object; strict
//!    registrations to it are now fatal, lenient ones are refused
//! 4. **Clear**: every registered weak variable still holding the object is
//!    nulled and the entry is removed
//!
//! ## Safety
//!
//! `register` is `unsafe`: each registered location must remain valid for
//! pointer-sized reads and writes until it is unregistered or its referent
//! is cleared. `clear` writes through those locations.
//!
//! ### Thread Safety
//!
//! - `WeakRegistry` and `Runtime` are `Send + Sync`
//! - Operations on the same referent are totally ordered by the registry lock
//! - A registered location is written at most once, by `clear`, under the lock
//!
//! ## Modules
//!
//! - [`config`]: Table configuration and validation
//! - [`error`]: Error types
//! - [`lifecycle`]: Destruction marker consulted on registration
//! - [`logging`]: Structured table events
//! - [`pointer`]: Disguised pointer codec
//! - [`registry`]: The locked registry
//! - [`runtime`]: Host runtime context driving object teardown
//! - [`stats`]: Counters and metrics export
//! - [`table`]: Registry table and weak entries

// Core table
pub mod pointer;
pub mod registry;
pub mod table;

// Configuration and errors
pub mod config;
pub mod error;

// Host integration
pub mod lifecycle;
pub mod runtime;

// Monitoring
pub mod logging;
pub mod stats;

// Re-export main types for convenience
pub use config::{FatalAction, WeakTableConfig};
pub use error::{Result, WeakError};
pub use lifecycle::{DestroyingSet, DestructionMarker, NeverDestroying};
pub use pointer::DisguisedPtr;
pub use registry::{WeakRegistry, WeakTableGuard};
pub use runtime::Runtime;
pub use table::{WeakEntry, WeakTable, INLINE_CAPACITY};

/// FWT version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize a runtime context with default configuration
///
/// # Examples
///
/// ```rust
/// let runtime = fwt::init()?;
/// assert!(runtime.registry().is_empty());
/// # Ok::<(), fwt::WeakError>(())
/// ```
pub fn init() -> Result<Runtime> {
    Runtime::new(WeakTableConfig::default())
}

/// Initialize a runtime context with custom configuration
///
/// # Examples
///
/// ```rust
/// use fwt::{FatalAction, WeakTableConfig};
///
/// let config = WeakTableConfig {
///     initial_capacity: 4096,
///     fatal_action: FatalAction::Abort,
///     ..Default::default()
/// };
///
/// let runtime = fwt::init_with_config(config)?;
/// assert_eq!(runtime.registry().lock().capacity(), 4096);
/// # Ok::<(), fwt::WeakError>(())
/// ```
pub fn init_with_config(config: WeakTableConfig) -> Result<Runtime> {
    Runtime::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_default() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let config = WeakTableConfig {
            initial_capacity: 0,
            ..Default::default()
        };
        assert!(init_with_config(config).is_err());
    }

    #[test]
    fn test_version_not_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WeakRegistry>();
        assert_send_sync::<Runtime>();
    }
}
