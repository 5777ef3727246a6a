//! Structured logging setup

use super::ActivityLayer;
use crate::config::LogFormat;
use crate::observer::ActivityLog;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Initialize logging with the given level
///
/// `RUST_LOG` takes precedence over `level` when set. When an activity log is
/// supplied, warnings, errors and trade events are mirrored into it
/// independently of the console filter.
pub fn init_logging(
    level: &str,
    format: LogFormat,
    activity: Option<ActivityLog>,
) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .with(activity.map(ActivityLayer::new))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    Ok(())
}
