//! Telemetry module
//!
//! Structured logging, the observer activity feed and Prometheus metrics

mod activity;
mod logging;
mod metrics;

pub use activity::{ActivityLayer, TRADE_TARGET};
pub use logging::init_logging;
pub use metrics::{increment, install_exporter, set_gauge, CounterMetric, GaugeMetric};

use crate::config::TelemetryConfig;
use crate::observer::ActivityLog;

/// Guard that keeps telemetry alive for the lifetime of the process
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(
    config: &TelemetryConfig,
    activity: ActivityLog,
) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format, Some(activity))?;

    if config.metrics_port > 0 {
        install_exporter(config.metrics_port)?;
    }

    Ok(TelemetryGuard { _priv: () })
}
