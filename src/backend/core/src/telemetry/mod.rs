//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: JSON/pretty/compact `tracing` output with `EnvFilter`
//! - **Metrics**: request durations, auth outcomes, error and denial counters
//!
//! # Example
//!
//! ```rust,no_run
//! use assetdesk_core::telemetry::{init_logging, init_metrics, LoggingConfig, MetricsConfig};
//!
//! init_logging(&LoggingConfig::default()).expect("logging");
//! let registry = init_metrics(&MetricsConfig::default()).expect("metrics");
//! ```

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, LogFormat, LoggingConfig};
pub use self::metrics::{
    init_metrics, AccessMetrics, MetricsConfig, MetricsRegistry, RequestDurationHistogram,
};
