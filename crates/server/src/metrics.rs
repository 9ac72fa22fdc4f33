//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the bookhound server:
//! - HTTP request metrics (latency, counts)
//! - Chat bridge connection metrics
//! - Search and session gauges (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::error;

use bookhound_core::SearchStatus;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bookhound_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookhound_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookhound_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Bridge Metrics
// =============================================================================

/// Chat clients currently attached to the bridge.
pub static BRIDGE_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookhound_bridge_connections_active",
        "Number of chat clients attached to the bridge",
    )
    .unwrap()
});

/// Total bridge connections (cumulative).
pub static BRIDGE_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookhound_bridge_connections_total",
        "Total bridge connections since startup",
    )
    .unwrap()
});

/// Bridge messages sent to chat clients, by type.
pub static BRIDGE_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookhound_bridge_messages_sent_total",
            "Messages sent to bridge clients",
        ),
        &["type"],
    )
    .unwrap()
});

/// Chat events received from bridge clients, by type.
pub static BRIDGE_EVENTS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookhound_bridge_events_received_total",
            "Chat events received from bridge clients",
        ),
        &["type"],
    )
    .unwrap()
});

/// Bridge lag events (client fell behind the outbound channel).
pub static BRIDGE_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookhound_bridge_lag_events_total",
        "Bridge lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Session Metrics (collected dynamically)
// =============================================================================

/// Searches by current status.
pub static SEARCHES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("bookhound_searches_by_status", "Current search count by status"),
        &["status"],
    )
    .unwrap()
});

/// Known search peers.
pub static SEARCH_PEERS_KNOWN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookhound_search_peers_known",
        "Number of search peers announced in the channel topic",
    )
    .unwrap()
});

/// Files saved to the download directory.
pub static DOWNLOADS_SAVED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "bookhound_downloads_saved",
        "Number of files saved to the download directory",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Bridge
    registry
        .register(Box::new(BRIDGE_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(BRIDGE_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(BRIDGE_MESSAGES_SENT.clone()))
        .unwrap();
    registry
        .register(Box::new(BRIDGE_EVENTS_RECEIVED.clone()))
        .unwrap();
    registry
        .register(Box::new(BRIDGE_LAG_EVENTS.clone()))
        .unwrap();

    // Session
    registry
        .register(Box::new(SEARCHES_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(SEARCH_PEERS_KNOWN.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOADS_SAVED.clone()))
        .unwrap();

    // Core metrics (searches, listings, downloads)
    for metric in bookhound_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from the current session.
///
/// Called before encoding so the gauges reflect the session at scrape time.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let session = state.session().lock().await;

    for status in [
        SearchStatus::Pending,
        SearchStatus::InProgress,
        SearchStatus::NoResults,
        SearchStatus::ResultsFound,
        SearchStatus::Error,
    ] {
        let count = session
            .all_searches()
            .iter()
            .filter(|s| s.status() == status)
            .count();
        SEARCHES_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }

    SEARCH_PEERS_KNOWN.set(session.peers().len() as i64);
    DOWNLOADS_SAVED.set(session.downloads().len() as i64);
}

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_SEGMENT.replace_all(path, "{id}");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
