//! Stats Module - Weak Table Activity Counters
//!
//! Counters collected by a `WeakRegistry` for:
//! - Production monitoring
//! - Spotting misuse of the write barrier
//! - Sizing `initial_capacity`
//!
//! All counters are relaxed atomics. They are updated while the registry
//! lock is held, but read without it, so a summary taken during heavy
//! traffic is a best-effort snapshot.

pub mod metrics;

pub use metrics::{MetricValue, WeakMetrics};

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// WeakStats - activity counters for one registry
#[derive(Debug)]
pub struct WeakStats {
    registrations: AtomicU64,
    duplicate_registrations: AtomicU64,
    rejected_registrations: AtomicU64,
    unregistrations: AtomicU64,
    missed_unregistrations: AtomicU64,
    clears: AtomicU64,
    empty_clears: AtomicU64,
    referrers_nulled: AtomicU64,
    misused_referrers: AtomicU64,
    promotions: AtomicU64,
    entry_growths: AtomicU64,
    table_growths: AtomicU64,
    start_time: Instant,
}

impl WeakStats {
    /// Create new stats collector
    pub fn new() -> Self {
        Self {
            registrations: AtomicU64::new(0),
            duplicate_registrations: AtomicU64::new(0),
            rejected_registrations: AtomicU64::new(0),
            unregistrations: AtomicU64::new(0),
            missed_unregistrations: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            empty_clears: AtomicU64::new(0),
            referrers_nulled: AtomicU64::new(0),
            misused_referrers: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            entry_growths: AtomicU64::new(0),
            table_growths: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a `register` call; `created` is false for duplicates
    pub fn record_registration(&self, created: bool) {
        if created {
            self.registrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.duplicate_registrations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a registration refused because the referent is dying
    pub fn record_rejection(&self) {
        self.rejected_registrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an `unregister` call; `removed` is false when nothing matched
    pub fn record_unregistration(&self, removed: bool) {
        if removed {
            self.unregistrations.fetch_add(1, Ordering::Relaxed);
        } else {
            self.missed_unregistrations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a `clear` of a referent that had an entry
    pub fn record_clear(&self, nulled: usize, misused: usize) {
        self.clears.fetch_add(1, Ordering::Relaxed);
        self.referrers_nulled
            .fetch_add(nulled as u64, Ordering::Relaxed);
        self.misused_referrers
            .fetch_add(misused as u64, Ordering::Relaxed);
    }

    /// Record a `clear` of a referent nobody referenced weakly
    pub fn record_empty_clear(&self) {
        self.empty_clears.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entry_growth(&self) {
        self.entry_growths.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_table_growth(&self) {
        self.table_growths.fetch_add(1, Ordering::Relaxed);
    }

    /// Get summary statistics
    pub fn summary(&self) -> WeakSummary {
        WeakSummary {
            registrations: self.registrations.load(Ordering::Relaxed),
            duplicate_registrations: self.duplicate_registrations.load(Ordering::Relaxed),
            rejected_registrations: self.rejected_registrations.load(Ordering::Relaxed),
            unregistrations: self.unregistrations.load(Ordering::Relaxed),
            missed_unregistrations: self.missed_unregistrations.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            empty_clears: self.empty_clears.load(Ordering::Relaxed),
            referrers_nulled: self.referrers_nulled.load(Ordering::Relaxed),
            misused_referrers: self.misused_referrers.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            entry_growths: self.entry_growths.load(Ordering::Relaxed),
            table_growths: self.table_growths.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    /// Reset statistics
    pub fn reset(&self) {
        for counter in [
            &self.registrations,
            &self.duplicate_registrations,
            &self.rejected_registrations,
            &self.unregistrations,
            &self.missed_unregistrations,
            &self.clears,
            &self.empty_clears,
            &self.referrers_nulled,
            &self.misused_referrers,
            &self.promotions,
            &self.entry_growths,
            &self.table_growths,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for WeakStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct WeakSummary {
    /// New bindings created
    pub registrations: u64,
    /// Registrations of an already bound location
    pub duplicate_registrations: u64,
    /// Registrations refused because the referent was being destroyed
    pub rejected_registrations: u64,
    /// Bindings removed by unregister
    pub unregistrations: u64,
    /// Unregister calls that matched nothing
    pub missed_unregistrations: u64,
    /// Referents cleared that had an entry
    pub clears: u64,
    /// Clears of referents without an entry
    pub empty_clears: u64,
    /// Weak variables nulled by clear
    pub referrers_nulled: u64,
    /// Weak variables found overwritten during clear
    pub misused_referrers: u64,
    /// Entries moved to out-of-line storage
    pub promotions: u64,
    /// Out-of-line referrer set growths
    pub entry_growths: u64,
    /// Registry table growths
    pub table_growths: u64,
    /// Seconds since the collector was created
    pub uptime_secs: u64,
}

impl WeakSummary {
    /// Bindings currently expected to be live
    ///
    /// Bindings dropped by clear count as nulled or misused, so this is only
    /// exact when nothing was overwritten behind the table's back.
    pub fn live_bindings(&self) -> u64 {
        self.registrations
            .saturating_sub(self.unregistrations)
            .saturating_sub(self.referrers_nulled)
            .saturating_sub(self.misused_referrers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = WeakStats::new();
        stats.record_registration(true);
        stats.record_registration(true);
        stats.record_registration(false);
        stats.record_unregistration(true);
        stats.record_unregistration(false);
        stats.record_clear(1, 0);
        stats.record_empty_clear();

        let summary = stats.summary();
        assert_eq!(summary.registrations, 2);
        assert_eq!(summary.duplicate_registrations, 1);
        assert_eq!(summary.unregistrations, 1);
        assert_eq!(summary.missed_unregistrations, 1);
        assert_eq!(summary.clears, 1);
        assert_eq!(summary.empty_clears, 1);
        assert_eq!(summary.referrers_nulled, 1);
        assert_eq!(summary.live_bindings(), 0);
    }

    #[test]
    fn test_reset() {
        let stats = WeakStats::new();
        stats.record_promotion();
        stats.record_table_growth();
        stats.record_rejection();
        stats.reset();

        let summary = stats.summary();
        assert_eq!(summary.promotions, 0);
        assert_eq!(summary.table_growths, 0);
        assert_eq!(summary.rejected_registrations, 0);
    }

    #[test]
    fn test_summary_serializes() {
        let stats = WeakStats::new();
        stats.record_clear(3, 1);
        let json = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(json["referrers_nulled"], 3);
        assert_eq!(json["misused_referrers"], 1);
    }
}
