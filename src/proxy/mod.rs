//! Upstream relay subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (route + gates passed)
//!     → forwarder.rs (rewrite URI, normalize headers, relay, map failures)
//!     → upstream.rs (name → base address)
//!     → upstream service
//! ```

pub mod forwarder;
pub mod upstream;

pub use forwarder::{ForwardContext, Forwarder, ForwarderSettings};
pub use upstream::{Upstream, UpstreamRegistry};
