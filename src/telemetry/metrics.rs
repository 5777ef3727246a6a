//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Price feed message applied to the snapshot
    FeedMessage,
    /// Price feed reconnect attempt
    FeedReconnect,
    /// Entry order accepted by the venue
    OrderSubmitted,
    /// Pending order confirmed filled
    OrderFilled,
    /// Pending order cancelled after timeout
    OrderCancelled,
    /// Order rejected or errored
    OrderFailed,
    /// Stop-loss exit sent
    StopLossExit,
    /// Redemption confirmed
    RedeemSucceeded,
    /// Redemption failed
    RedeemFailed,
    /// State record could not be written
    StateWriteFailed,
    /// Active session changed
    SessionRollover,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Reference price minus benchmark
    Divergence,
    /// Seconds until the active session ends
    RemainingSecs,
    /// Latest reference price
    ReferencePrice,
    /// Session benchmark price
    BenchmarkPrice,
    /// 1 when a position is held
    OpenPosition,
    /// 1 when an order is pending
    PendingOrder,
    /// Redeemable conditions seen on the last scan
    RedeemPending,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::FeedMessage => "polyupdown_feed_messages_total",
        CounterMetric::FeedReconnect => "polyupdown_feed_reconnects_total",
        CounterMetric::OrderSubmitted => "polyupdown_orders_submitted_total",
        CounterMetric::OrderFilled => "polyupdown_orders_filled_total",
        CounterMetric::OrderCancelled => "polyupdown_orders_cancelled_total",
        CounterMetric::OrderFailed => "polyupdown_orders_failed_total",
        CounterMetric::StopLossExit => "polyupdown_stop_loss_exits_total",
        CounterMetric::RedeemSucceeded => "polyupdown_redeems_succeeded_total",
        CounterMetric::RedeemFailed => "polyupdown_redeems_failed_total",
        CounterMetric::StateWriteFailed => "polyupdown_state_write_failures_total",
        CounterMetric::SessionRollover => "polyupdown_session_rollovers_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::Divergence => "polyupdown_divergence_usd",
        GaugeMetric::RemainingSecs => "polyupdown_session_remaining_secs",
        GaugeMetric::ReferencePrice => "polyupdown_reference_price_usd",
        GaugeMetric::BenchmarkPrice => "polyupdown_benchmark_price_usd",
        GaugeMetric::OpenPosition => "polyupdown_open_position",
        GaugeMetric::PendingOrder => "polyupdown_pending_order",
        GaugeMetric::RedeemPending => "polyupdown_redeem_pending",
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(counter_name(metric)).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(gauge_name(metric)).set(value);
}

/// Install the Prometheus exporter with an HTTP scrape listener
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}
