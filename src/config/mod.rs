//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or built-in defaults
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the route table in particular never
//!   changes after startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_default, ConfigError};
pub use schema::{
    AuthConfig, AuthRequirement, CorsConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RouteConfig, SecurityConfig, ServiceConfig,
    SessionBackend, SessionConfig, TimeoutConfig,
};
