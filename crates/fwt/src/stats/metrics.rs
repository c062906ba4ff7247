//! Weak Table Metrics - Export Metrics
//!
//! Exports registry counters and table gauges to monitoring systems
//! (Prometheus text format, or JSON).

use super::WeakSummary;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Prefix applied to every exported metric name
pub const METRIC_PREFIX: &str = "fwt_";

/// WeakMetrics - metrics exporter
///
/// Insertion order is kept so exports are stable between scrapes.
pub struct WeakMetrics {
    metrics: Mutex<IndexMap<String, MetricValue>>,
}

impl WeakMetrics {
    pub fn new() -> Self {
        Self {
            metrics: Mutex::new(IndexMap::new()),
        }
    }

    /// Build a metric set from a counter summary and current table shape
    pub fn from_summary(summary: &WeakSummary, entries: usize, capacity: usize) -> Self {
        let metrics = Self::new();
        let counters = [
            ("registrations_total", summary.registrations),
            ("duplicate_registrations_total", summary.duplicate_registrations),
            ("rejected_registrations_total", summary.rejected_registrations),
            ("unregistrations_total", summary.unregistrations),
            ("missed_unregistrations_total", summary.missed_unregistrations),
            ("clears_total", summary.clears),
            ("empty_clears_total", summary.empty_clears),
            ("referrers_nulled_total", summary.referrers_nulled),
            ("misused_referrers_total", summary.misused_referrers),
            ("promotions_total", summary.promotions),
            ("entry_growths_total", summary.entry_growths),
            ("table_growths_total", summary.table_growths),
        ];
        for (name, value) in counters {
            metrics.add(format!("{}{}", METRIC_PREFIX, name), MetricValue::Counter(value));
        }

        let load = if capacity == 0 {
            0.0
        } else {
            entries as f64 / capacity as f64
        };
        metrics.add(
            format!("{}entries", METRIC_PREFIX),
            MetricValue::Gauge(entries as f64),
        );
        metrics.add(
            format!("{}capacity", METRIC_PREFIX),
            MetricValue::Gauge(capacity as f64),
        );
        metrics.add(format!("{}load_factor", METRIC_PREFIX), MetricValue::Gauge(load));
        metrics.add(
            format!("{}uptime_seconds", METRIC_PREFIX),
            MetricValue::Gauge(summary.uptime_secs as f64),
        );
        metrics
    }

    /// Add metric
    pub fn add(&self, name: String, value: MetricValue) {
        self.metrics.lock().insert(name, value);
    }

    /// Get metric
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics.lock().get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.lock().is_empty()
    }

    /// Export to Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let metrics = self.metrics.lock();
        let mut output = String::new();

        for (name, value) in metrics.iter() {
            output.push_str(&format!("# TYPE {} {}\n", name, value.type_name()));
            output.push_str(&format!("{} {}\n", name, value.as_f64()));
        }

        output
    }

    /// Export to JSON
    pub fn to_json(&self) -> serde_json::Value {
        let metrics = self.metrics.lock();
        let object: serde_json::Map<String, serde_json::Value> = metrics
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}

impl Default for WeakMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Counter(u64),
    Gauge(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Counter(v) => *v as f64,
            MetricValue::Gauge(v) => *v,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            MetricValue::Counter(_) => "counter",
            MetricValue::Gauge(_) => "gauge",
        }
    }

    fn to_json(self) -> serde_json::Value {
        match self {
            MetricValue::Counter(v) => serde_json::Value::from(v),
            MetricValue::Gauge(v) => serde_json::Value::from(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeakMetrics {
        let summary = WeakSummary {
            registrations: 10,
            clears: 2,
            ..Default::default()
        };
        WeakMetrics::from_summary(&summary, 16, 64)
    }

    #[test]
    fn test_from_summary() {
        let metrics = sample();
        assert_eq!(
            metrics.get("fwt_registrations_total"),
            Some(MetricValue::Counter(10))
        );
        assert_eq!(metrics.get("fwt_load_factor"), Some(MetricValue::Gauge(0.25)));
        assert!(metrics.get("registrations_total").is_none());
    }

    #[test]
    fn test_prometheus_export_keeps_order() {
        let text = sample().to_prometheus();
        let registrations = text.find("fwt_registrations_total 10").unwrap();
        let capacity = text.find("fwt_capacity 64").unwrap();
        assert!(registrations < capacity);
        assert!(text.contains("# TYPE fwt_clears_total counter"));
        assert!(text.contains("# TYPE fwt_entries gauge"));
    }

    #[test]
    fn test_json_export() {
        let json = sample().to_json();
        assert_eq!(json["fwt_clears_total"], 2);
        assert_eq!(json["fwt_entries"], 16.0);
    }
}
