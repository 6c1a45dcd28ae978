//! Metrics
//!
//! Token lifecycle metrics interfaces and implementations.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::manager::SweepReport;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Outcome of a refresh decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The handler issued a new token.
    Success,
    /// The handler or the write-back failed.
    Failure,
    /// Another caller refreshed the token while this one waited.
    Coalesced,
    /// Refresh failed but the still-valid cached token was served.
    Fallback,
}

impl RefreshOutcome {
    /// Label value for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Coalesced => "coalesced",
            Self::Fallback => "fallback",
        }
    }
}

/// Token lifecycle metrics interface.
pub trait TokenMetrics: Send + Sync {
    /// Record a token lookup through the manager.
    fn record_lookup(&self, resource: &str, hit: bool);

    /// Record the outcome of a refresh attempt.
    fn record_refresh(&self, resource: &str, outcome: RefreshOutcome);

    /// Record a completed background sweep.
    fn record_sweep(&self, report: &SweepReport);
}

/// No-op metrics implementation.
pub struct NoOpMetrics;

impl TokenMetrics for NoOpMetrics {
    fn record_lookup(&self, _resource: &str, _hit: bool) {}
    fn record_refresh(&self, _resource: &str, _outcome: RefreshOutcome) {}
    fn record_sweep(&self, _report: &SweepReport) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpMetrics {
    NoOpMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
}

/// In-memory metrics for testing.
#[derive(Default)]
pub struct InMemoryMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemoryMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Count refresh entries with the given outcome.
    pub fn refresh_count(&self, outcome: RefreshOutcome) -> usize {
        self.get_entries_by_name("token_refreshes_total")
            .iter()
            .filter(|e| e.labels.get("outcome").map(String::as_str) == Some(outcome.as_str()))
            .count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        self.entries.lock().push(MetricEntry {
            name: name.to_string(),
            value,
            labels,
        });
    }
}

impl TokenMetrics for InMemoryMetrics {
    fn record_lookup(&self, resource: &str, hit: bool) {
        let mut labels = MetricLabels::new();
        labels.insert("resource".to_string(), resource.to_string());
        labels.insert("hit".to_string(), hit.to_string());
        self.record("token_lookups_total", 1.0, labels);
    }

    fn record_refresh(&self, resource: &str, outcome: RefreshOutcome) {
        let mut labels = MetricLabels::new();
        labels.insert("resource".to_string(), resource.to_string());
        labels.insert("outcome".to_string(), outcome.as_str().to_string());
        self.record("token_refreshes_total", 1.0, labels);
    }

    fn record_sweep(&self, report: &SweepReport) {
        self.record("token_sweep_scanned", report.scanned as f64, MetricLabels::new());
        self.record("token_sweep_refreshed", report.refreshed as f64, MetricLabels::new());
        self.record("token_sweep_failed", report.failed as f64, MetricLabels::new());
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemoryMetrics {
    InMemoryMetrics::new()
}
