//! Request and correlation ID assignment.
//!
//! # Responsibilities
//! - Reuse inbound `X-Request-ID` / `X-Correlation-ID`, generate UUID v4 when absent
//! - Make the IDs visible to inner layers (headers + request extension)
//! - Stamp the same IDs onto the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An inbound ID is never rewritten or truncated, whatever its length
//! - Values that are not valid header text are replaced, not rejected

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_CORRELATION_ID: &str = "x-correlation-id";
pub const X_USER_ID: &str = "x-user-id";

/// IDs attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    pub request_id: String,
    pub correlation_id: String,
}

fn usable(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

impl RequestIds {
    /// Take existing IDs from the headers, minting any that are missing.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: usable(headers, X_REQUEST_ID).unwrap_or_else(new_id),
            correlation_id: usable(headers, X_CORRELATION_ID).unwrap_or_else(new_id),
        }
    }

    /// Write both IDs into `headers`, replacing whatever was there.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(v) = HeaderValue::from_str(&self.request_id) {
            headers.insert(X_REQUEST_ID, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.correlation_id) {
            headers.insert(X_CORRELATION_ID, v);
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Middleware assigning request/correlation IDs.
pub async fn assign_request_ids(mut request: Request, next: Next) -> Response {
    let ids = RequestIds::from_headers(request.headers());
    ids.apply(request.headers_mut());
    request.extensions_mut().insert(ids.clone());

    let mut response = next.run(request).await;
    ids.apply(response.headers_mut());
    response
}
