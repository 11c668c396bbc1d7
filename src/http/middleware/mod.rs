//! Cross-cutting request middleware.
//!
//! Outermost first: panic containment → timeout → request IDs → CORS →
//! body limit → dispatch (auth + rate gates) → security headers.

pub mod body_limit;
pub mod cors;
pub mod panic;
pub mod timeout;

pub use body_limit::envelope_oversized_body;
pub use cors::cors_layer;
pub use panic::panic_layer;
pub use timeout::{enforce_timeout, RequestDeadline};
