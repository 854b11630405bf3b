//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the offloader:
//! - Cycle outcomes and transfer throughput (incremented by the offload loop)
//! - Queue length, active transfers and device latency (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Offload cycles by outcome.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dashvault_cycles_total", "Offload cycles by outcome"),
        &["outcome"],
    )
    .unwrap()
});

/// Recordings transferred and deleted from the device.
pub static TRANSFERS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashvault_transfers_total",
        "Recordings copied locally and deleted from the device",
    )
    .unwrap()
});

/// Payload bytes received.
pub static BYTES_TRANSFERRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashvault_bytes_transferred_total",
        "Total payload bytes received from the device",
    )
    .unwrap()
});

/// Queue rebuilds forced by mid-drain failures.
pub static QUEUE_REBUILDS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dashvault_queue_rebuilds_total",
        "Queue rebuilds forced by transfer failures",
    )
    .unwrap()
});

/// Current transfer queue length (collected dynamically).
pub static QUEUE_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashvault_queue_length",
        "Recordings waiting in the transfer queue",
    )
    .unwrap()
});

/// Transfers currently in flight (collected dynamically).
pub static TRANSFERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashvault_transfers_active",
        "Number of transfers currently in flight",
    )
    .unwrap()
});

/// Last measured device heartbeat latency (collected dynamically).
pub static DEVICE_LATENCY_MS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "dashvault_device_latency_ms",
        "Last heartbeat round-trip latency in milliseconds",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(CYCLES_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(TRANSFERS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(BYTES_TRANSFERRED_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(QUEUE_REBUILDS_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(QUEUE_LENGTH.clone())).unwrap();
    registry
        .register(Box::new(TRANSFERS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(DEVICE_LATENCY_MS.clone()))
        .unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the live offloader view.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.offloader().status().await;
    QUEUE_LENGTH.set(status.queue_len as i64);
    TRANSFERS_ACTIVE.set(status.active_transfers.len() as i64);
    if let Some(health) = status.last_health {
        DEVICE_LATENCY_MS.set(health.latency_ms as i64);
    }
}
