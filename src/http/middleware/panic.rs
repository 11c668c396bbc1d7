//! Panic containment.
//!
//! Wraps `tower_http::catch_panic` so a panic anywhere below the outermost
//! layer becomes the standard 500 envelope instead of a dropped connection.

use std::any::Any;

use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::GatewayError;

/// Layer converting panics into `InternalFault` responses.
pub fn panic_layer() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    crate::observability::metrics::record_internal_fault();
    GatewayError::InternalFault(detail).into_response()
}
