//! Error Module - FWT Error Types
//!
//! Defines the error types used by the weak reference table.
//!
//! # Error Categories
//!
//! ## Programmer Errors
//! - `ReferentDestroying` - strict registration against an object whose
//!   destruction has already begun
//!
//! ## Resource Errors
//! - `TableExhausted` - a slot array could not be grown
//!
//! ## Configuration Errors
//! - `Configuration` - invalid `WeakTableConfig`
//!
//! ## Internal Errors
//! - `Internal` - invariant violation inside the table
//!
//! Benign conditions (unregistering an unknown location, registering the
//! same location twice, clearing an object nobody references weakly) are
//! not errors and never surface here.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all FWT operations
///
/// # Examples
///
/// ```rust
/// use fwt::error::WeakError;
///
/// fn describe(err: &WeakError) -> &'static str {
///     match err {
///         WeakError::ReferentDestroying { .. } => "caller raced object teardown",
///         WeakError::TableExhausted { .. } => "out of memory",
///         _ => "other",
///     }
/// }
///
/// let err = WeakError::ReferentDestroying { referent: 0x1000, location: 0x2000 };
/// assert_eq!(describe(&err), "caller raced object teardown");
/// assert!(err.is_fatal());
/// ```
#[derive(Debug, Error)]
pub enum WeakError {
    /// Weak reference requested for an object that is being destroyed
    ///
    /// **When returned:** `try_register` with strict checking while the
    /// lifecycle marker reports the referent as destroying
    ///
    /// **Recovery strategy:** None. The caller would otherwise receive a
    /// dangling reference.
    #[error(
        "cannot form weak reference to {referent:#x} from {location:#x}: object is being destroyed"
    )]
    ReferentDestroying { referent: usize, location: usize },

    /// Slot array could not be allocated
    ///
    /// **When returned:** growing the registry table or an out-of-line
    /// referrer set failed to reserve memory
    ///
    /// **Recovery strategy:** None. Every live weak reference must be
    /// tracked, there is no degraded mode.
    #[error("weak table exhausted: could not grow {table} to {requested} slots")]
    TableExhausted {
        table: &'static str,
        requested: usize,
    },

    /// Configuration error
    ///
    /// **When returned:** `WeakRegistry::new` or `Runtime::new` received an
    /// invalid configuration
    ///
    /// **Recovery strategy:** Fix the configuration or use the default
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Internal error - indicates a bug in FWT
    ///
    /// **When returned:** a probe found no free slot below the load factor
    /// limit, or another invariant was violated
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WeakError {
    /// Check if this error must terminate the caller
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WeakError::Configuration(_))
    }

    /// Check if this error indicates a bug in the calling convention or
    /// in FWT itself
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            WeakError::ReferentDestroying { .. } | WeakError::Internal(_)
        )
    }
}

/// Result type alias for FWT operations
pub type Result<T> = std::result::Result<T, WeakError>;
