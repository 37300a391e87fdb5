//! Logging and metrics bootstrap for the Maxbot binaries.

mod config;
mod metric_names;
mod tracing_init;

pub use config::TelemetryConfig;
pub use metric_names::describe_metrics;
pub use tracing_init::{init_telemetry, telemetry_initialized};
