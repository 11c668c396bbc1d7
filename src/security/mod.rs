//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client sliding window, after the auth gate)
//!     → headers.rs (strip hop-by-hop on relay, add security headers)
//! ```
//!
//! # Design Decisions
//! - A rejected request never reaches an upstream
//! - `X-Forwarded-For` / `X-Real-IP` identify clients only when
//!   `trust_forwarded_headers` is set

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{client_address, RateDecision, RateLimitState, SlidingWindowLimiter};
