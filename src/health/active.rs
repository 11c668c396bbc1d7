//! On-demand upstream health reporting.
//!
//! # Responsibilities
//! - Probe every upstream when asked, never from a cache
//! - Summarize results as `healthy` / `degraded`
//! - Serve liveness and readiness endpoints
//!
//! # Design Decisions
//! - `/health` always answers 200; the body carries the verdict
//! - `/health/ready` answers 503 when any upstream is down so orchestrators
//!   can hold traffic back
//! - A failed probe degrades the report but never blocks proxied traffic

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::proxy::Forwarder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Body of the health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, bool>,
}

impl HealthReport {
    pub fn from_probes(probes: impl IntoIterator<Item = (String, bool)>) -> Self {
        let services: BTreeMap<String, bool> = probes.into_iter().collect();
        let status = if services.values().all(|healthy| *healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            timestamp: Utc::now(),
            services,
        }
    }
}

/// Probes every upstream and reports their state.
#[derive(Clone)]
pub struct HealthMonitor {
    forwarder: Forwarder,
}

impl HealthMonitor {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    pub async fn check_all(&self) -> HealthReport {
        let report = HealthReport::from_probes(self.forwarder.probe_all().await);
        if report.status == HealthStatus::Degraded {
            let down: Vec<&str> = report
                .services
                .iter()
                .filter(|(_, healthy)| !**healthy)
                .map(|(name, _)| name.as_str())
                .collect();
            tracing::warn!(services = ?down, "Upstreams unhealthy");
        }
        report
    }
}

/// `GET /health`
pub async fn health(State(monitor): State<HealthMonitor>) -> Json<HealthReport> {
    Json(monitor.check_all().await)
}

/// `GET /health/live`
pub async fn live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive", "timestamp": Utc::now() }))
}

/// `GET /health/ready`
pub async fn ready(State(monitor): State<HealthMonitor>) -> impl IntoResponse {
    let report = monitor.check_all().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}
