//! Prometheus metrics for provider workers, the bus and consumers
//!
//! This module provides metrics tracking for:
//! - Workers: fetch duration, fetch faults, in-flight fetches, new vs duplicate events
//! - Bus: published events and per-subscriber deliveries
//! - Consumers: processed events and processing failures
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or is never attempted, metrics operations are no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all worker and delivery metrics
struct MonitorMetrics {
    fetch_duration: HistogramVec,
    fetch_faults: CounterVec,
    fetches_in_flight: Gauge,
    events_new: CounterVec,
    events_duplicate: CounterVec,
    events_published: CounterVec,
    bus_deliveries: Counter,
    consumer_processed: CounterVec,
    consumer_failures: CounterVec,
}

/// Global storage for metrics
static MONITOR_METRICS: OnceLock<MonitorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, the error is returned and subsequent
/// metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = statuswatch::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = MonitorMetrics {
        fetch_duration: register_histogram_vec!(
            "statuswatch_fetch_duration_seconds",
            "Time spent in a provider fetch call in seconds",
            &["provider"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        fetch_faults: register_counter_vec!(
            "statuswatch_fetch_faults_total",
            "Fetch calls that panicked instead of returning an empty result",
            &["provider"]
        )?,
        fetches_in_flight: register_gauge!(
            "statuswatch_fetches_in_flight",
            "Provider fetch calls currently holding an admission permit"
        )?,
        events_new: register_counter_vec!(
            "statuswatch_events_new_total",
            "Events admitted by the deduplication store",
            &["provider"]
        )?,
        events_duplicate: register_counter_vec!(
            "statuswatch_events_duplicate_total",
            "Events rejected as already seen",
            &["provider"]
        )?,
        events_published: register_counter_vec!(
            "statuswatch_events_published_total",
            "Events published to the bus",
            &["provider"]
        )?,
        bus_deliveries: register_counter!(
            "statuswatch_bus_deliveries_total",
            "Events placed into subscriber queues"
        )?,
        consumer_processed: register_counter_vec!(
            "statuswatch_consumer_processed_total",
            "Events handled successfully by a consumer",
            &["consumer"]
        )?,
        consumer_failures: register_counter_vec!(
            "statuswatch_consumer_failures_total",
            "Events a consumer failed to handle",
            &["consumer"]
        )?,
    };

    MONITOR_METRICS
        .set(metrics)
        .map_err(|_| "Monitor metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    MONITOR_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Gauge guard counting a fetch as in flight until dropped
pub struct InFlightGuard {
    active: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.active {
            if let Some(m) = MONITOR_METRICS.get() {
                m.fetches_in_flight.dec();
            }
        }
    }
}

/// Mark a fetch as in flight
pub fn fetch_started() -> InFlightGuard {
    match MONITOR_METRICS.get() {
        Some(m) => {
            m.fetches_in_flight.inc();
            InFlightGuard { active: true }
        }
        None => InFlightGuard { active: false },
    }
}

/// Record a finished fetch call
pub fn record_fetch(provider: &str, duration: Duration, faulted: bool) {
    let Some(m) = MONITOR_METRICS.get() else {
        return;
    };

    m.fetch_duration
        .with_label_values(&[provider])
        .observe(duration.as_secs_f64());

    if faulted {
        m.fetch_faults.with_label_values(&[provider]).inc();
    }
}

/// Record deduplication results for one cycle
pub fn record_dedup_results(provider: &str, new_events: usize, duplicates: usize) {
    let Some(m) = MONITOR_METRICS.get() else {
        return;
    };

    if new_events > 0 {
        m.events_new
            .with_label_values(&[provider])
            .inc_by(new_events as f64);
    }
    if duplicates > 0 {
        m.events_duplicate
            .with_label_values(&[provider])
            .inc_by(duplicates as f64);
    }
}

/// Record one event published to the bus
pub fn record_published(provider: &str) {
    if let Some(m) = MONITOR_METRICS.get() {
        m.events_published.with_label_values(&[provider]).inc();
    }
}

/// Record how many subscriber queues received one published event
pub fn record_deliveries(count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = MONITOR_METRICS.get() {
        m.bus_deliveries.inc_by(count as f64);
    }
}

/// Record the outcome of a consumer handling one event
pub fn record_consumer_result(consumer: &str, success: bool) {
    let Some(m) = MONITOR_METRICS.get() else {
        return;
    };

    if success {
        m.consumer_processed.with_label_values(&[consumer]).inc();
    } else {
        m.consumer_failures.with_label_values(&[consumer]).inc();
    }
}
