// crates/overseer-server/src/telemetry.rs
// ============================================================================
// Module: Server Telemetry
// Description: Request metrics labels and the recording seam.
// Purpose: Provide counters and latency buckets without hard metric deps.
// Dependencies: axum, tracing
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for API request counters
//! and latency histograms. It is intentionally dependency-light so
//! deployments can plug in Prometheus or OpenTelemetry without redesign;
//! the default sink emits structured tracing events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for API request histograms.
pub const API_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 300_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx/3xx response.
    Ok,
    /// 4xx response.
    ClientError,
    /// 5xx response.
    ServerError,
}

impl RequestOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
        }
    }

    /// Classifies an HTTP status code.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            500.. => Self::ServerError,
            400..=499 => Self::ClientError,
            _ => Self::Ok,
        }
    }
}

/// One recorded API request.
#[derive(Debug, Clone)]
pub struct RequestMetric {
    /// HTTP method label.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Outcome classification.
    pub outcome: RequestOutcome,
    /// Wall-clock latency.
    pub latency: Duration,
}

/// Recording seam for request metrics.
pub trait MetricsSink: Send + Sync {
    /// Records one completed request.
    fn record_request(&self, metric: &RequestMetric);
}

/// Default sink emitting structured tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_request(&self, metric: &RequestMetric) {
        tracing::info!(
            method = %metric.method,
            path = %metric.path,
            outcome = metric.outcome.as_str(),
            latency_ms = u64::try_from(metric.latency.as_millis()).unwrap_or(u64::MAX),
            "api request"
        );
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Axum middleware recording every request through the default sink.
pub async fn track(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    TracingMetrics.record_request(&RequestMetric {
        method,
        path,
        outcome: RequestOutcome::from_status(response.status().as_u16()),
        latency: start.elapsed(),
    });
    response
}
