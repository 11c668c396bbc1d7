//! Request deadline enforcement.
//!
//! # Responsibilities
//! - Race the inner pipeline against a fixed per-request budget
//! - Publish the absolute deadline so the forwarder can cap upstream calls
//!
//! # Design Decisions
//! - On expiry the inner future is dropped, cancelling in-flight upstream I/O
//! - The timeout response echoes inbound `X-Request-ID` and
//!   `X-Correlation-ID` because the ID layer sits inside this one

use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::time;

use crate::error::GatewayError;
use crate::http::request::{X_CORRELATION_ID, X_REQUEST_ID};

/// Absolute deadline of the current request, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDeadline {
    pub expires_at: Instant,
    pub budget: Duration,
}

impl RequestDeadline {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Middleware failing the request with 408 once `budget` elapses.
pub async fn enforce_timeout(
    State(budget): State<Duration>,
    mut request: Request,
    next: Next,
) -> Response {
    let deadline = RequestDeadline::starting_now(budget);
    request.extensions_mut().insert(deadline);

    let request_id: Option<HeaderValue> = request.headers().get(X_REQUEST_ID).cloned();
    let correlation_id: Option<HeaderValue> = request.headers().get(X_CORRELATION_ID).cloned();
    let path = request.uri().path().to_string();

    match time::timeout(budget, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(
                path = %path,
                budget_ms = budget.as_millis() as u64,
                "Request deadline exceeded"
            );
            let mut response = GatewayError::RequestTimeout(budget).into_response();
            if let Some(id) = request_id {
                response.headers_mut().insert(X_REQUEST_ID, id);
            }
            if let Some(id) = correlation_id {
                response.headers_mut().insert(X_CORRELATION_ID, id);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http, http::StatusCode, middleware, routing::get, Extension, Router};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(finished: Arc<AtomicBool>) -> Router {
        Router::new()
            .route(
                "/slow",
                get(move || {
                    let finished = finished.clone();
                    async move {
                        time::sleep(Duration::from_millis(500)).await;
                        finished.store(true, Ordering::SeqCst);
                        "late"
                    }
                }),
            )
            .route(
                "/budget",
                get(|Extension(deadline): Extension<RequestDeadline>| async move {
                    deadline.remaining().as_millis().to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(
                Duration::from_millis(50),
                enforce_timeout,
            ))
    }

    #[tokio::test]
    async fn expiry_returns_408_and_drops_work() {
        let finished = Arc::new(AtomicBool::new(false));
        let response = app(finished.clone())
            .oneshot(
                http::Request::builder()
                    .uri("/slow")
                    .header(X_REQUEST_ID, "abc")
                    .header(X_CORRELATION_ID, "flow-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers()[X_REQUEST_ID], "abc");
        assert_eq!(response.headers()[X_CORRELATION_ID], "flow-7");

        time::sleep(Duration::from_millis(600)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn deadline_is_visible_downstream() {
        let response = app(Arc::new(AtomicBool::new(false)))
            .oneshot(http::Request::builder().uri("/budget").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        let remaining: u64 = std::str::from_utf8(&bytes).unwrap().parse().unwrap();
        assert!(remaining <= 50);
    }
}
