//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - One error type for every failure a request can hit on its way through
//!   the gateway (route match, auth gate, rate gate, upstream relay)
//! - Map each failure to a fixed HTTP status and a stable error code
//! - Render the client-facing error envelope
//!
//! # Design Decisions
//! - `Display` is the operator-facing text (logged); `public_message` is what
//!   the client sees, so internal detail never leaks into responses
//! - Status codes are drawn from a fixed table; nothing else is emitted

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::store::StoreError;
use crate::http::response::ErrorEnvelope;

/// Every way a request can fail inside the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No cookie, bearer token, or session header was presented.
    #[error("no session credential presented")]
    NoCredential,

    /// A credential was presented but the session is unknown or expired.
    #[error("session not found or expired")]
    InvalidSession,

    #[error("credentials rejected")]
    InvalidCredentials,

    /// Valid session, but its role does not satisfy the route.
    #[error("role {role} is not allowed on this route")]
    InsufficientRole { role: String },

    #[error("no route matches {path}")]
    RouteNotFound { path: String },

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: Method, path: String },

    #[error("request exceeded deadline of {0:?}")]
    RequestTimeout(Duration),

    #[error("rate limit of {limit} requests exceeded, retry in {retry_after:?}")]
    RateLimited { limit: usize, retry_after: Duration },

    /// Catch-all for faults that escaped deeper layers (including panics).
    #[error("internal fault: {0}")]
    InternalFault(String),

    #[error("upstream {service} unreachable: {reason}")]
    UpstreamUnreachable { service: String, reason: String },

    #[error("upstream {service} answered with status {status}")]
    UpstreamBadStatus { service: String, status: StatusCode },

    /// The route names a service that is not configured.
    #[error("upstream {service} is not configured")]
    UpstreamUnavailable { service: String },

    #[error("upstream {service} did not answer within {timeout:?}")]
    UpstreamTimeout { service: String, timeout: Duration },

    #[error("session store failure: {0}")]
    SessionStore(#[from] StoreError),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NoCredential
            | GatewayError::InvalidSession
            | GatewayError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            GatewayError::InsufficientRole { .. } => StatusCode::FORBIDDEN,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::InternalFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamUnreachable { .. } | GatewayError::UpstreamBadStatus { .. } => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::UpstreamUnavailable { .. } | GatewayError::SessionStore(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Stable machine-readable code placed in the envelope's `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::NoCredential | GatewayError::InvalidSession => "UNAUTHORIZED",
            GatewayError::InvalidCredentials => "INVALID_CREDENTIALS",
            GatewayError::InsufficientRole { .. } => "FORBIDDEN",
            GatewayError::RouteNotFound { .. } => "NOT_FOUND",
            GatewayError::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            GatewayError::RequestTimeout(_) => "REQUEST_TIMEOUT",
            GatewayError::RateLimited { .. } => "TOO_MANY_REQUESTS",
            GatewayError::InternalFault(_) => "INTERNAL_SERVER_ERROR",
            GatewayError::UpstreamUnreachable { .. } | GatewayError::UpstreamBadStatus { .. } => {
                "BAD_GATEWAY"
            }
            GatewayError::UpstreamUnavailable { .. } | GatewayError::SessionStore(_) => {
                "SERVICE_UNAVAILABLE"
            }
            GatewayError::UpstreamTimeout { .. } => "GATEWAY_TIMEOUT",
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "bad_request",
            GatewayError::NoCredential => "no_credential",
            GatewayError::InvalidSession => "invalid_session",
            GatewayError::InvalidCredentials => "invalid_credentials",
            GatewayError::InsufficientRole { .. } => "insufficient_role",
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::MethodNotAllowed { .. } => "method_not_allowed",
            GatewayError::RequestTimeout(_) => "request_timeout",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::InternalFault(_) => "internal_fault",
            GatewayError::UpstreamUnreachable { .. } => "upstream_unreachable",
            GatewayError::UpstreamBadStatus { .. } => "upstream_bad_status",
            GatewayError::UpstreamUnavailable { .. } => "upstream_unavailable",
            GatewayError::UpstreamTimeout { .. } => "upstream_timeout",
            GatewayError::SessionStore(_) => "session_store",
        }
    }

    /// Message shown to the client.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::BadRequest(msg) => msg.clone(),
            GatewayError::NoCredential => "Authentication required".to_string(),
            GatewayError::InvalidSession => "Invalid session".to_string(),
            GatewayError::InvalidCredentials => "Invalid credentials".to_string(),
            GatewayError::InsufficientRole { .. } => "Admin access required".to_string(),
            GatewayError::RouteNotFound { .. } => "Endpoint not found".to_string(),
            GatewayError::MethodNotAllowed { .. } => "Method not allowed".to_string(),
            GatewayError::RequestTimeout(_) => "Request timeout".to_string(),
            GatewayError::RateLimited { .. } => "Rate limit exceeded".to_string(),
            GatewayError::InternalFault(_) => "Internal server error".to_string(),
            GatewayError::UpstreamUnreachable { service, .. } => {
                format!("Service {} is currently unavailable", service)
            }
            GatewayError::UpstreamBadStatus { service, .. } => {
                format!("Service {} returned an unexpected response", service)
            }
            GatewayError::UpstreamUnavailable { service } => {
                format!("Service {} is not available", service)
            }
            GatewayError::UpstreamTimeout { service, .. } => {
                format!("Service {} did not respond in time", service)
            }
            GatewayError::SessionStore(_) => "Session store unavailable".to_string(),
        }
    }

    fn data(&self) -> Option<Value> {
        match self {
            GatewayError::RouteNotFound { path } => Some(json!({ "path": path })),
            GatewayError::RateLimited { limit, retry_after } => Some(json!({
                "limit": limit,
                "retry_after_secs": retry_after_secs(*retry_after),
            })),
            GatewayError::UpstreamUnreachable { service, .. }
            | GatewayError::UpstreamUnavailable { service }
            | GatewayError::UpstreamTimeout { service, .. } => Some(json!({ "service": service })),
            GatewayError::UpstreamBadStatus { service, status } => Some(json!({
                "service": service,
                "upstream_status": status.as_u16(),
            })),
            _ => None,
        }
    }
}

/// Whole seconds, rounded up so clients never retry too early.
fn retry_after_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = ErrorEnvelope::new(self.public_message(), self.code(), self.data());
        let mut response = (status, envelope).into_response();

        if let GatewayError::RateLimited { limit, retry_after } = &self {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(*retry_after)));
            headers.insert("x-ratelimit-limit", HeaderValue::from(*limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

/// Convenience alias used across the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;
