//! Request relay to upstream services.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the target upstream
//! - Normalize headers: strip credentials and hop-by-hop headers, add
//!   gateway identity, propagate trace IDs
//! - Cap the upstream wait at the remaining request deadline
//! - Translate transport failures into `GatewayError`
//! - Probe upstream health on demand
//!
//! # Design Decisions
//! - Upstream status codes are relayed untouched; only transport failures
//!   become gateway errors
//! - Health is never cached; every probe is a fresh GET
//! - `X-User-ID` comes from the resolved session when there is one, otherwise
//!   an inbound value passes through

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::Request,
    http::{header, request::Parts, Extensions, HeaderMap, HeaderValue, StatusCode, Version},
    response::Response,
};
use futures_util::future::join_all;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::error::GatewayError;
use crate::http::middleware::RequestDeadline;
use crate::http::request::{RequestIds, X_USER_ID};
use crate::observability::metrics;
use crate::proxy::upstream::{Upstream, UpstreamRegistry};
use crate::security::headers::strip_hop_by_hop;

pub const X_FORWARDED_BY: &str = "x-forwarded-by";
pub const X_TARGET_SERVICE: &str = "x-target-service";
pub const X_PROXIED_BY: &str = "x-proxied-by";
pub const X_SERVICE_NAME: &str = "x-service-name";

/// Per-request inputs the dispatcher hands to the forwarder.
#[derive(Debug, Clone)]
pub struct ForwardContext {
    pub target: String,
    /// Path after prefix rewriting.
    pub path: String,
    pub client: String,
    pub user_id: Option<u64>,
    pub ids: RequestIds,
    pub deadline: Option<RequestDeadline>,
}

/// Static forwarder settings.
#[derive(Debug, Clone)]
pub struct ForwarderSettings {
    pub gateway_name: String,
    pub user_agent: String,
    pub upstream_timeout: Duration,
    pub health_path: String,
    pub probe_timeout: Duration,
}

/// Relays requests to named upstreams over a shared connection pool.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    upstreams: UpstreamRegistry,
    settings: ForwarderSettings,
}

impl Forwarder {
    pub fn new(upstreams: UpstreamRegistry, settings: ForwarderSettings) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            upstreams,
            settings,
        }
    }

    pub fn upstreams(&self) -> &UpstreamRegistry {
        &self.upstreams
    }

    /// Relay `request` to `ctx.target`.
    pub async fn forward(&self, request: Request, ctx: ForwardContext) -> Result<Response, GatewayError> {
        let upstream = self
            .upstreams
            .get(&ctx.target)
            .ok_or_else(|| GatewayError::UpstreamUnavailable {
                service: ctx.target.clone(),
            })?;

        let (mut parts, body) = request.into_parts();
        parts.uri = upstream
            .target_uri(&ctx.path, parts.uri.query())
            .map_err(|e| GatewayError::BadRequest(format!("Invalid request path: {}", e)))?;
        parts.version = Version::HTTP_11;
        parts.extensions = Extensions::new();
        self.prepare_headers(&mut parts, &ctx);

        let (budget, deadline_bound) = match ctx.deadline {
            Some(deadline) if deadline.remaining() < self.settings.upstream_timeout => {
                (deadline.remaining(), true)
            }
            _ => (self.settings.upstream_timeout, false),
        };

        let started = Instant::now();
        tracing::debug!(
            request_id = %ctx.ids.request_id,
            service = %upstream.name,
            uri = %parts.uri,
            "Forwarding request"
        );

        let outcome = time::timeout(budget, self.client.request(Request::from_parts(parts, body))).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(
                    request_id = %ctx.ids.request_id,
                    service = %upstream.name,
                    elapsed_ms,
                    error = %e,
                    "Upstream unreachable"
                );
                metrics::record_upstream_error(&upstream.name, "unreachable");
                return Err(GatewayError::UpstreamUnreachable {
                    service: upstream.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %ctx.ids.request_id,
                    service = %upstream.name,
                    elapsed_ms,
                    "Upstream timed out"
                );
                metrics::record_upstream_error(&upstream.name, "timeout");
                return Err(match ctx.deadline {
                    Some(deadline) if deadline_bound => GatewayError::RequestTimeout(deadline.budget),
                    _ => GatewayError::UpstreamTimeout {
                        service: upstream.name.clone(),
                        timeout: budget,
                    },
                });
            }
        };

        tracing::debug!(
            request_id = %ctx.ids.request_id,
            service = %upstream.name,
            status = response.status().as_u16(),
            elapsed_ms,
            "Upstream responded"
        );

        Ok(self.relay_response(response, upstream, &ctx))
    }

    /// Upstream status and body pass through; headers are normalized.
    fn relay_response(
        &self,
        response: hyper::Response<Incoming>,
        upstream: &Upstream,
        ctx: &ForwardContext,
    ) -> Response {
        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        ctx.ids.apply(&mut parts.headers);
        set(&mut parts.headers, X_PROXIED_BY, &self.settings.gateway_name);
        set(&mut parts.headers, X_SERVICE_NAME, &upstream.name);

        Response::from_parts(parts, Body::new(body))
    }

    fn prepare_headers(&self, parts: &mut Parts, ctx: &ForwardContext) {
        let headers = &mut parts.headers;
        strip_hop_by_hop(headers);
        headers.remove(header::HOST);
        headers.remove(header::COOKIE);
        headers.remove(header::AUTHORIZATION);

        set(headers, X_FORWARDED_BY, &self.settings.gateway_name);
        set(headers, X_TARGET_SERVICE, &ctx.target);
        set(headers, "user-agent", &self.settings.user_agent);
        ctx.ids.apply(headers);

        if let Some(user_id) = ctx.user_id {
            headers.insert(X_USER_ID, HeaderValue::from(user_id));
        }

        let forwarded_for = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, ctx.client),
            _ => ctx.client.clone(),
        };
        set(headers, "x-forwarded-for", &forwarded_for);
    }

    /// GET `<base><health_path>`; healthy iff the answer is 200.
    pub async fn probe(&self, upstream: &Upstream) -> bool {
        let uri = match upstream.target_uri(&self.settings.health_path, None) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(service = %upstream.name, error = %e, "Invalid health probe URI");
                return false;
            }
        };

        let request = match axum::http::Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::USER_AGENT, &self.settings.user_agent)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build health check request: {}", e);
                return false;
            }
        };

        let healthy = match time::timeout(self.settings.probe_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let ok = response.status() == StatusCode::OK;
                if !ok {
                    tracing::warn!(service = %upstream.name, status = %response.status(), "Health check failed: non-success status");
                }
                ok
            }
            Ok(Err(e)) => {
                tracing::warn!(service = %upstream.name, error = %e, "Health check failed: connection error");
                false
            }
            Err(_) => {
                tracing::warn!(service = %upstream.name, "Health check failed: timeout");
                false
            }
        };

        metrics::record_upstream_health(&upstream.name, healthy);
        healthy
    }

    /// Probe every upstream concurrently, in configuration order.
    pub async fn probe_all(&self) -> Vec<(String, bool)> {
        let probes = self.upstreams.iter().map(|upstream| async move {
            (upstream.name.clone(), self.probe(upstream).await)
        });
        join_all(probes).await
    }
}

fn set(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = name, "Dropping header with invalid value"),
    }
}
