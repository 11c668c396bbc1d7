//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request / correlation IDs)
//!     → middleware/ (panic containment, deadline, CORS)
//!     → [routing::dispatcher decides auth, rate and target]
//!     → response.rs (envelopes)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{assign_request_ids, RequestIds, X_CORRELATION_ID, X_REQUEST_ID, X_USER_ID};
pub use response::{ApiResponse, ErrorEnvelope};
pub use server::{GatewayServer, GatewayServerBuilder, ServerError};
