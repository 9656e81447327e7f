//! Observability module
//!
//! Structured logging for lifecycle events, metrics collection, and the optional
//! Prometheus exporter.

pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry_setup;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
pub use telemetry_setup::init_metrics;
