//! Prometheus metrics for the orchestrator
//!
//! This module provides metrics tracking for:
//! - Cycles by outcome and power-save mode
//! - Resolution tiers and attempts per cycle
//! - Collaborator failures by collaborator and kind
//! - Wishlist writes
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Encoder,
    Histogram, IntCounter, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all orchestrator metrics
struct OrchestratorMetrics {
    cycles: CounterVec,
    resolutions: CounterVec,
    attempts: Histogram,
    collaborator_failures: CounterVec,
    wishlist_entries: IntCounter,
    cycle_duration: Histogram,
}

/// Global storage for orchestrator metrics
static METRICS: OnceLock<OrchestratorMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// ```ignore
/// if let Err(e) = onair::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = OrchestratorMetrics {
        cycles: register_counter_vec!(
            "onair_cycles_total",
            "Completed orchestration cycles by outcome",
            &["outcome", "power_save"]
        )?,
        resolutions: register_counter_vec!(
            "onair_resolutions_total",
            "Successful resolutions by match tier",
            &["tier"]
        )?,
        attempts: register_histogram!(
            "onair_cycle_attempts",
            "Resolution attempts used per cycle",
            vec![1.0, 2.0, 3.0, 4.0, 5.0]
        )?,
        collaborator_failures: register_counter_vec!(
            "onair_collaborator_failures_total",
            "Collaborator failures by collaborator and kind",
            &["collaborator", "kind"]
        )?,
        wishlist_entries: register_int_counter!(
            "onair_wishlist_entries_total",
            "Unresolvable suggestions written to the wishlist"
        )?,
        cycle_duration: register_histogram!(
            "onair_cycle_duration_seconds",
            "Wall time of a cycle in seconds",
            vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        )?,
    };

    METRICS
        .set(metrics)
        .map_err(|_| "Orchestrator metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    METRICS.get().is_some()
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

/// Record a finished cycle
pub fn record_cycle(outcome: &str, power_save: bool, attempts: usize, duration_secs: f64) {
    let Some(m) = METRICS.get() else {
        return;
    };

    let mode = if power_save { "true" } else { "false" };
    m.cycles.with_label_values(&[outcome, mode]).inc();
    m.attempts.observe(attempts as f64);
    m.cycle_duration.observe(duration_secs);
}

/// Record which tier resolved a suggestion
pub fn record_resolution(tier: &str) {
    if let Some(m) = METRICS.get() {
        m.resolutions.with_label_values(&[tier]).inc();
    }
}

/// Record a collaborator failure
pub fn record_collaborator_failure(collaborator: &str, kind: &str) {
    if let Some(m) = METRICS.get() {
        m.collaborator_failures
            .with_label_values(&[collaborator, kind])
            .inc();
    }
}

/// Record a wishlist write
pub fn record_wishlist_entry() {
    if let Some(m) = METRICS.get() {
        m.wishlist_entries.inc();
    }
}

// ============================================================================
// HTTP Endpoint
// ============================================================================

async fn metrics_handler() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Router exposing `GET /metrics`
pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve `/metrics` until the shutdown future resolves
pub async fn serve(
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving metrics");

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Tests
// ============================================================================
