//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health, /health/ready
//!     → active.rs (probe every upstream concurrently via the forwarder's pool)
//!     → {status: healthy|degraded, timestamp, services: {name: bool}}
//! GET /health/live
//!     → process liveness only, no probes
//! ```
//!
//! # Design Decisions
//! - Health is derived from fresh probes; nothing is cached between calls
//! - Health state is per-upstream

pub mod active;

pub use active::{HealthMonitor, HealthReport, HealthStatus};
