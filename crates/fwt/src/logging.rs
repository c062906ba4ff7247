//! Weak Table Logging
//!
//! Structured event log for the weak reference table, useful for:
//! - Tracking table growth in long running programs
//! - Finding weak variables that were overwritten behind the table's back
//! - Debugging teardown races
//!
//! Events are kept in a bounded in-memory history and forwarded to the
//! `log` facade under the `fwt` target. Warnings and errors always reach
//! the facade, even when the logger itself is disabled.
//!
//! The registry queues events while it holds its lock and calls
//! [`WeakLogger::log`] only after releasing it.
//!
//! Log Levels:
//! - ERROR: Rejected strict registrations
//! - WARN: Misused referrers, rejected lenient registrations
//! - DEBUG: Table growth, entry promotion
//! - TRACE: Per-object clears, out-of-line growth

use crate::pointer::DisguisedPtr;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for table events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Weak table event types
///
/// Addresses stay disguised while the event sits in the history and are
/// only decoded when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeakEvent {
    /// Registry table doubled
    TableGrown {
        from: usize,
        to: usize,
        entries: usize,
    },

    /// Entry moved from inline to out-of-line storage
    EntryPromoted {
        referent: DisguisedPtr,
        referrers: usize,
    },

    /// Out-of-line referrer set doubled
    EntryGrown {
        referent: DisguisedPtr,
        from: usize,
        to: usize,
    },

    /// All weak references to a referent were cleared
    ReferentCleared {
        referent: DisguisedPtr,
        nulled: usize,
    },

    /// A registered location no longer held its referent during clear
    MisusedReferrer {
        location: DisguisedPtr,
        referent: DisguisedPtr,
        found: DisguisedPtr,
    },

    /// Registration against a referent under destruction was refused
    RegistrationRejected {
        referent: DisguisedPtr,
        location: DisguisedPtr,
        strict: bool,
    },
}

impl WeakEvent {
    /// Level an event is recorded at
    pub fn level(&self) -> LogLevel {
        match self {
            WeakEvent::RegistrationRejected { strict: true, .. } => LogLevel::Error,
            WeakEvent::RegistrationRejected { strict: false, .. }
            | WeakEvent::MisusedReferrer { .. } => LogLevel::Warn,
            WeakEvent::TableGrown { .. } | WeakEvent::EntryPromoted { .. } => LogLevel::Debug,
            WeakEvent::EntryGrown { .. } | WeakEvent::ReferentCleared { .. } => LogLevel::Trace,
        }
    }

    /// Human-readable rendering
    pub fn to_human(&self) -> String {
        match self {
            WeakEvent::TableGrown { from, to, entries } => {
                format!(
                    "[FWT] Weak table grew from {} to {} slots ({} entries)",
                    from, to, entries
                )
            },
            WeakEvent::EntryPromoted {
                referent,
                referrers,
            } => {
                format!(
                    "[FWT] Entry for {:#x} moved out of line ({} referrers)",
                    referent.decode(),
                    referrers
                )
            },
            WeakEvent::EntryGrown { referent, from, to } => {
                format!(
                    "[FWT] Referrer set for {:#x} grew from {} to {} slots",
                    referent.decode(),
                    from,
                    to
                )
            },
            WeakEvent::ReferentCleared { referent, nulled } => {
                format!(
                    "[FWT] Cleared {} weak references to {:#x}",
                    nulled,
                    referent.decode()
                )
            },
            WeakEvent::MisusedReferrer {
                location,
                referent,
                found,
            } => {
                format!(
                    "[FWT] Weak variable at {:#x} holds {:#x} instead of {:#x}; \
                     it was overwritten without unregistering",
                    location.decode(),
                    found.decode(),
                    referent.decode()
                )
            },
            WeakEvent::RegistrationRejected {
                referent,
                location,
                strict,
            } => {
                format!(
                    "[FWT] Refused weak reference to {:#x} from {:#x}: object is being destroyed{}",
                    referent.decode(),
                    location.decode(),
                    if *strict { " (fatal)" } else { "" }
                )
            },
        }
    }

    /// JSON rendering
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            WeakEvent::TableGrown { from, to, entries } => serde_json::json!({
                "type": "table_grown",
                "from": from,
                "to": to,
                "entries": entries
            }),
            WeakEvent::EntryPromoted {
                referent,
                referrers,
            } => serde_json::json!({
                "type": "entry_promoted",
                "referent": format!("{:#x}", referent.decode()),
                "referrers": referrers
            }),
            WeakEvent::EntryGrown { referent, from, to } => serde_json::json!({
                "type": "entry_grown",
                "referent": format!("{:#x}", referent.decode()),
                "from": from,
                "to": to
            }),
            WeakEvent::ReferentCleared { referent, nulled } => serde_json::json!({
                "type": "referent_cleared",
                "referent": format!("{:#x}", referent.decode()),
                "nulled": nulled
            }),
            WeakEvent::MisusedReferrer {
                location,
                referent,
                found,
            } => serde_json::json!({
                "type": "misused_referrer",
                "location": format!("{:#x}", location.decode()),
                "referent": format!("{:#x}", referent.decode()),
                "found": format!("{:#x}", found.decode())
            }),
            WeakEvent::RegistrationRejected {
                referent,
                location,
                strict,
            } => serde_json::json!({
                "type": "registration_rejected",
                "referent": format!("{:#x}", referent.decode()),
                "location": format!("{:#x}", location.decode()),
                "strict": strict
            }),
        }
    }
}

/// Weak logger configuration
#[derive(Debug, Clone)]
pub struct WeakLoggerConfig {
    /// Record and forward events at all
    pub enabled: bool,

    /// Minimum log level
    pub level: LogLevel,

    /// Enable JSON format
    pub json: bool,

    /// Enable timestamps
    pub timestamps: bool,

    /// Number of events kept in memory
    pub history: usize,
}

impl Default for WeakLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            json: false,
            timestamps: true,
            history: 256,
        }
    }
}

/// Weak logger - event log for one weak table
pub struct WeakLogger {
    config: WeakLoggerConfig,
    events: Mutex<VecDeque<(Instant, WeakEvent)>>,
    enabled: AtomicBool,
}

impl WeakLogger {
    /// Create new logger
    pub fn new(config: WeakLoggerConfig) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled,
        }
    }

    /// Logger that drops every event
    pub fn disabled() -> Self {
        Self::new(WeakLoggerConfig {
            enabled: false,
            ..Default::default()
        })
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Whether an event at `level` would be recorded
    pub fn accepts(&self, level: LogLevel) -> bool {
        self.is_enabled() && level <= self.config.level
    }

    /// Whether an event at `level` reaches either the history or the facade
    pub fn should_emit(&self, level: LogLevel) -> bool {
        level <= LogLevel::Warn || self.accepts(level)
    }

    /// Log a table event
    pub fn log(&self, event: WeakEvent) {
        let level = event.level();
        if !self.accepts(level) {
            if level <= LogLevel::Warn {
                log::log!(target: "fwt", level.into(), "{}", event.to_human());
            }
            return;
        }

        let line = self.render(&event);
        log::log!(target: "fwt", level.into(), "{}", line);

        if self.config.history == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() == self.config.history {
            events.pop_front();
        }
        events.push_back((Instant::now(), event));
    }

    /// Render an event according to the configured format
    pub fn render(&self, event: &WeakEvent) -> String {
        let body = if self.config.json {
            self.render_json(event)
        } else {
            event.to_human()
        };

        if self.config.timestamps {
            let now = chrono::Local::now();
            format!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        }
    }

    fn render_json(&self, event: &WeakEvent) -> String {
        serde_json::to_string(&event.to_json()).unwrap_or_else(|_| event.to_human())
    }

    /// Get all retained events, oldest first
    pub fn get_events(&self) -> Vec<(Instant, WeakEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    /// Clear retained events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get retained event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for WeakLogger {
    fn default() -> Self {
        Self::new(WeakLoggerConfig::default())
    }
}
