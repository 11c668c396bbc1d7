//! HTTP edge gateway library.
//!
//! Session authentication, role gating, per-client rate limiting and
//! request forwarding in front of a fixed set of backend services.

pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
