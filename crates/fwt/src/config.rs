//! Configuration Module - Weak Table Tuning Parameters
//!
//! Manages the configuration of a `WeakRegistry`.
//! The table has very few knobs: its starting size, what happens on a
//! fatal error, and how chatty its event logger is.

use crate::logging::{LogLevel, WeakLoggerConfig};

/// Smallest registry capacity accepted by `validate`
pub const MIN_TABLE_CAPACITY: usize = 8;

/// Largest initial registry capacity accepted by `validate`
pub const MAX_INITIAL_CAPACITY: usize = 1 << 24;

/// Upper bound for the retained event history
pub const MAX_EVENT_HISTORY: usize = 1 << 16;

/// What to do when the table hits a fatal condition
///
/// Fatal conditions are strict registration against a dying referent and
/// failure to grow a slot array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalAction {
    /// Panic with the error message (unwinds through the caller)
    #[default]
    Panic,
    /// Abort the process immediately
    Abort,
}

/// Main configuration for the weak reference table
///
/// # Examples
///
/// ```rust
/// use fwt::config::{FatalAction, WeakTableConfig};
///
/// let config = WeakTableConfig {
///     initial_capacity: 1024,
///     fatal_action: FatalAction::Abort,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct WeakTableConfig {
    /// Initial number of entry slots in the registry table
    ///
    /// Must be a power of two. The table doubles whenever an insertion
    /// would push the load factor past 3/4 and never shrinks.
    ///
    /// Default: 64
    pub initial_capacity: usize,

    /// Reaction to fatal conditions
    ///
    /// Default: `FatalAction::Panic`
    pub fatal_action: FatalAction,

    /// Enable the structured event logger
    ///
    /// Table growth, promotions, clears and misuse reports are recorded
    /// and forwarded to the `log` facade.
    /// Default: false
    pub verbose: bool,

    /// Minimum level of recorded events
    ///
    /// Default: `LogLevel::Info`
    pub log_level: LogLevel,

    /// Render events as JSON instead of plain text
    ///
    /// Default: false
    pub json_events: bool,

    /// Prefix rendered events with a wall clock timestamp
    ///
    /// Default: true
    pub timestamps: bool,

    /// Number of events kept in memory by the logger
    ///
    /// Default: 256
    pub event_history: usize,
}

impl Default for WeakTableConfig {
    fn default() -> Self {
        WeakTableConfig {
            initial_capacity: 64,
            fatal_action: FatalAction::Panic,
            verbose: false,
            log_level: LogLevel::Info,
            json_events: false,
            timestamps: true,
            event_history: 256,
        }
    }
}

impl WeakTableConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use fwt::config::WeakTableConfig;
    ///
    /// let config = WeakTableConfig {
    ///     initial_capacity: 100, // not a power of two
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidCapacity(format!(
                "initial_capacity must be a power of two, got {}",
                self.initial_capacity
            )));
        }

        if self.initial_capacity < MIN_TABLE_CAPACITY {
            return Err(ConfigError::InvalidCapacity(format!(
                "initial_capacity must be at least {}",
                MIN_TABLE_CAPACITY
            )));
        }

        if self.initial_capacity > MAX_INITIAL_CAPACITY {
            return Err(ConfigError::InvalidCapacity(format!(
                "initial_capacity must be at most {}",
                MAX_INITIAL_CAPACITY
            )));
        }

        if self.verbose && self.event_history == 0 {
            return Err(ConfigError::InvalidEventHistory(
                "event_history must be > 0 when verbose logging is enabled".to_string(),
            ));
        }

        if self.event_history > MAX_EVENT_HISTORY {
            return Err(ConfigError::InvalidEventHistory(format!(
                "event_history must be at most {}",
                MAX_EVENT_HISTORY
            )));
        }

        Ok(())
    }

    /// Logger configuration derived from this table configuration
    pub fn logger_config(&self) -> WeakLoggerConfig {
        WeakLoggerConfig {
            enabled: self.verbose,
            level: self.log_level,
            json: self.json_events,
            timestamps: self.timestamps,
            history: self.event_history,
        }
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("Invalid event history: {0}")]
    InvalidEventHistory(String),
}
