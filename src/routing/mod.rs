//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (longest-prefix lookup)
//!     → matcher.rs (evaluate path + method conditions)
//!     → Return: matched Route, RouteNotFound, or MethodNotAllowed
//!     → dispatcher.rs (auth gate → rate gate → forward)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route, independent of
//!   handler registration order

pub mod dispatcher;
pub mod matcher;
pub mod router;

pub use dispatcher::{dispatch, DispatchStage, Dispatcher};
pub use router::{Route, RouteTable};
