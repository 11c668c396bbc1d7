//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → resolver.rs (cookie / bearer / header → session id)
//!     → session.rs (lookup + touch via SessionManager)
//!     → store.rs / redis_store.rs (key-value with TTL)
//!
//! Login (handlers.rs):
//!     credentials → credentials.rs (user service) → new session → Set-Cookie
//! ```
//!
//! # Design Decisions
//! - Sessions are opaque random ids; the store holds the only durable copy
//! - Resolution touches the session (last_seen + TTL), so it is not read-only
//! - The store is a trait object so tests and single-node setups run without Redis

pub mod credentials;
pub mod handlers;
pub mod redis_store;
pub mod resolver;
pub mod session;
pub mod store;

pub use credentials::{CredentialVerifier, UserIdentity, UserServiceClient};
pub use handlers::{AuthState, CookieSettings};
pub use redis_store::RedisStore;
pub use resolver::{authorize, extract_credential, AuthResolver, Credential, CredentialSource, ResolvedSession};
pub use session::{Role, Session, SessionManager};
pub use store::{spawn_purger, MemoryStore, SessionStore, StoreError};
