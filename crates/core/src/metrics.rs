//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Search lifecycle (submissions, outcomes)
//! - Listing parsing (lines, records per listing)
//! - Session (download requests, unsolicited files)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Search Lifecycle Metrics
// =============================================================================

/// Searches submitted total.
pub static SEARCHES_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("bookhound_searches_submitted_total", "Total searches submitted").unwrap()
});

/// Searches reaching a terminal state, by outcome.
pub static SEARCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookhound_search_outcomes_total",
            "Total searches finished by outcome",
        ),
        &["outcome"], // "no_results", "results_found", "results_delivered", "error"
    )
    .unwrap()
});

// =============================================================================
// Listing Metrics
// =============================================================================

/// Listing lines processed by result.
pub static LISTING_LINES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookhound_listing_lines_total", "Total listing lines processed"),
        &["result"], // "parsed", "malformed", "ignored"
    )
    .unwrap()
});

/// Records parsed per delivered listing.
pub static LISTING_RECORDS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bookhound_listing_records",
            "Number of records parsed per delivered listing",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

/// Download requests sent total.
pub static DOWNLOADS_REQUESTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookhound_downloads_requested_total",
        "Total download requests sent to peers",
    )
    .unwrap()
});

/// Files received that matched no live search and were saved as downloads.
pub static UNSOLICITED_FILES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "bookhound_unsolicited_files_total",
        "Total files saved that were not search listings",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search lifecycle
        Box::new(SEARCHES_SUBMITTED.clone()),
        Box::new(SEARCH_OUTCOMES.clone()),
        // Listing
        Box::new(LISTING_LINES.clone()),
        Box::new(LISTING_RECORDS.clone()),
        // Session
        Box::new(DOWNLOADS_REQUESTED.clone()),
        Box::new(UNSOLICITED_FILES.clone()),
    ]
}
