//! Telemetry
//!
//! Observability components for token lifecycle operations.
//!
//! - **Metrics**: refresh outcomes, lookups, and sweep results
//! - **Logging**: `tracing` subscriber setup for hosts

pub mod logging;
pub mod metrics;

// Metrics
pub use metrics::{
    create_in_memory_metrics, no_op_metrics, InMemoryMetrics, MetricEntry, MetricLabels,
    NoOpMetrics, RefreshOutcome, TokenMetrics,
};

// Logging
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
