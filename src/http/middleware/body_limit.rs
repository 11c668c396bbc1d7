//! Request body size cap.
//!
//! `RequestBodyLimitLayer` and axum's body extractors answer an oversized body
//! with a bare-text 413. The mapper below re-renders those as the error
//! envelope. Responses relayed from an upstream carry `X-Proxied-By` and pass
//! through untouched.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::proxy::forwarder::X_PROXIED_BY;

/// Response mapper turning gateway-side 413 rejections into a 400 envelope.
pub async fn envelope_oversized_body(State(limit): State<usize>, response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE
        || response.headers().contains_key(X_PROXIED_BY)
    {
        return response;
    }
    tracing::info!(limit, "Request body over limit");
    GatewayError::BadRequest(format!("Request body exceeds {} bytes", limit)).into_response()
}
