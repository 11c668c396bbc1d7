//! Client-facing response envelopes.
//!
//! # Responsibilities
//! - Success envelope for gateway-local endpoints
//! - Error envelope rendered by `GatewayError`
//! - Response headers stamped on everything the gateway returns
//!
//! # Design Decisions
//! - Both envelopes share the `{status, message, ...}` shape so clients can
//!   branch on `status` alone
//! - `data` is omitted entirely when absent, never serialized as `null`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// `{status: "error", message, error, data?}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: String,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, code: &'static str, data: Option<Value>) -> Self {
        Self {
            status: STATUS_ERROR,
            message: message.into(),
            error: code,
            data,
        }
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `{status: "success", message, data?}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: STATUS_SUCCESS,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_omits_missing_data() {
        let value = serde_json::to_value(ApiResponse::message("Logout successful")).unwrap();
        assert_eq!(value, json!({ "status": "success", "message": "Logout successful" }));
    }

    #[test]
    fn error_envelope_keeps_data() {
        let env = ErrorEnvelope::new("nope", "FORBIDDEN", Some(json!({ "k": 1 })));
        let value = serde_json::to_value(env).unwrap();
        assert_eq!(value["error"], "FORBIDDEN");
        assert_eq!(value["data"]["k"], 1);
    }
}
