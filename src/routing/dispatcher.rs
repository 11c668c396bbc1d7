//! Request dispatch: route match → auth gate → rate gate → forward.
//!
//! # Responsibilities
//! - Drive one request through the dispatch stages
//! - Reject paths carrying `.`/`..` segments before route lookup
//! - Short-circuit on the first failing gate, before any upstream call
//! - Rewrite the path only after every gate has seen the external path
//! - Record per-route request metrics
//!
//! # Design Decisions
//! - `none` routes never consult the auth resolver, so a stale credential
//!   cannot break a public endpoint
//! - The rate gate runs after the auth gate: rejected unauthenticated
//!   traffic does not consume a client's budget
//! - Every failure renders through `GatewayError`

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};

use crate::auth::resolver::{authorize, AuthResolver};
use crate::config::AuthRequirement;
use crate::error::GatewayError;
use crate::http::middleware::RequestDeadline;
use crate::http::request::RequestIds;
use crate::observability::metrics;
use crate::proxy::{ForwardContext, Forwarder};
use crate::routing::matcher::has_dot_segments;
use crate::routing::router::RouteTable;
use crate::security::rate_limit::{client_address, SlidingWindowLimiter};

/// Where a request is in its trip through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Received,
    RouteMatched,
    AuthChecked,
    RateChecked,
    Forwarded,
    ResponseReturned,
    Error,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Received => "received",
            DispatchStage::RouteMatched => "route_matched",
            DispatchStage::AuthChecked => "auth_checked",
            DispatchStage::RateChecked => "rate_checked",
            DispatchStage::Forwarded => "forwarded",
            DispatchStage::ResponseReturned => "response_returned",
            DispatchStage::Error => "error",
        }
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks stage and route label for logging after the fact.
struct Progress {
    stage: DispatchStage,
    route: String,
}

impl Progress {
    fn new() -> Self {
        Self {
            stage: DispatchStage::Received,
            route: "unmatched".to_string(),
        }
    }

    /// Move to `Error`, returning the stage the failure happened in.
    fn fail(&mut self) -> DispatchStage {
        std::mem::replace(&mut self.stage, DispatchStage::Error)
    }
}

/// Routes proxied traffic through the gates to the forwarder.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    resolver: AuthResolver,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    forwarder: Forwarder,
    trust_forwarded: bool,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        resolver: AuthResolver,
        limiter: Option<Arc<SlidingWindowLimiter>>,
        forwarder: Forwarder,
        trust_forwarded: bool,
    ) -> Self {
        Self {
            routes,
            resolver,
            limiter,
            forwarder,
            trust_forwarded,
        }
    }

    /// Dispatch one request, rendering any failure as the error envelope.
    pub async fn handle(&self, request: Request) -> Response {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let ids = request
            .extensions()
            .get::<RequestIds>()
            .cloned()
            .unwrap_or_else(|| RequestIds::from_headers(request.headers()));

        let mut progress = Progress::new();

        let response = match self.run(request, &ids, &mut progress).await {
            Ok(response) => {
                progress.stage = DispatchStage::ResponseReturned;
                tracing::debug!(
                    request_id = %ids.request_id,
                    route = %progress.route,
                    stage = %progress.stage,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Request dispatched"
                );
                response
            }
            Err(e) => {
                let failed_at = progress.fail();
                let status = e.status();
                if status.is_server_error() {
                    tracing::warn!(
                        request_id = %ids.request_id,
                        route = %progress.route,
                        stage = %failed_at,
                        status = status.as_u16(),
                        error = %e,
                        "Dispatch failed"
                    );
                } else {
                    tracing::info!(
                        request_id = %ids.request_id,
                        route = %progress.route,
                        stage = %failed_at,
                        status = status.as_u16(),
                        kind = e.kind(),
                        path = %path,
                        "Request rejected"
                    );
                }
                e.into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), &progress.route, started);
        response
    }

    async fn run(
        &self,
        request: Request,
        ids: &RequestIds,
        progress: &mut Progress,
    ) -> Result<Response, GatewayError> {
        let path = request.uri().path().to_string();
        if has_dot_segments(&path) {
            return Err(GatewayError::BadRequest("Invalid request path".to_string()));
        }
        let route = self.routes.resolve(request.method(), &path)?;
        progress.stage = DispatchStage::RouteMatched;
        progress.route = route.name.clone();

        let user_id = match route.auth {
            AuthRequirement::None => None,
            requirement => {
                let resolved = self
                    .resolver
                    .resolve(request.headers())
                    .await
                    .map_err(auth_failure)?;
                authorize(requirement, &resolved.session).map_err(auth_failure)?;
                Some(resolved.session.user_id)
            }
        };
        progress.stage = DispatchStage::AuthChecked;

        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|c| c.0);
        let client = client_address(request.headers(), remote, self.trust_forwarded);
        if let Some(limiter) = &self.limiter {
            limiter.admit(&client)?;
        }
        progress.stage = DispatchStage::RateChecked;

        let ctx = ForwardContext {
            target: route.target.clone(),
            path: route.rewrite_path(&path),
            client,
            user_id,
            ids: ids.clone(),
            deadline: request.extensions().get::<RequestDeadline>().copied(),
        };
        let response = self.forwarder.forward(request, ctx).await?;
        progress.stage = DispatchStage::Forwarded;
        Ok(response)
    }
}

fn auth_failure(e: GatewayError) -> GatewayError {
    metrics::record_auth_failure(e.kind());
    e
}

/// Fallback handler for every path not served by the gateway itself.
pub async fn dispatch(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.handle(request).await
}
