//! Session records and their lifecycle.
//!
//! # Responsibilities
//! - Mint unguessable session identifiers
//! - Serialize session records into the backing store under `<prefix>:<id>`
//! - Touch (last_seen + TTL reset) on every successful lookup
//! - Bulk invalidation by user id
//!
//! # Design Decisions
//! - The gateway is the only writer; the store is the only durable copy
//! - A failed touch never turns a found session into an auth failure
//! - A touch only rewrites a record that is still present, so a concurrent
//!   logout or bulk invalidation always wins
//! - Undecodable records are treated as absent

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::auth::store::{SessionStore, StoreError};

/// Bytes of entropy per session id (hex encoded to 64 chars).
const SESSION_ID_BYTES: usize = 32;

/// Role carried by a session. Parsed case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "user" => Role::User,
            _ => Role::Other(raw),
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        Role::from(raw.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::User => f.write_str("user"),
            Role::Other(raw) => f.write_str(raw),
        }
    }
}

/// Server-side record bound to a session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub last_seen: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
}

/// Creates, looks up, and invalidates sessions in a [`SessionStore`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    prefix: String,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }

    /// Fresh random session id from the OS-seeded thread RNG.
    pub fn generate_id() -> String {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Store a new session and return its id.
    pub async fn create(&self, session: &Session) -> Result<String, StoreError> {
        let id = Self::generate_id();
        self.write(&id, session).await?;
        tracing::info!(user_id = session.user_id, "Session created");
        Ok(id)
    }

    async fn write(&self, id: &str, session: &Session) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)?;
        self.store.put(&self.key(id), payload, self.ttl).await
    }

    async fn read(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable session record");
                Ok(None)
            }
        }
    }

    /// Look up a session and touch it. Not read-only: `last_seen` and the TTL
    /// are refreshed on every hit.
    pub async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let key = self.key(id);
        let Some(mut session) = self.read(&key).await? else {
            return Ok(None);
        };

        session.last_seen = Utc::now();
        let payload = serde_json::to_string(&session)?;
        match self.store.replace(&key, payload, self.ttl).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(user_id = session.user_id, "Session removed during lookup");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(user_id = session.user_id, error = %e, "Session touch failed");
            }
        }
        Ok(Some(session))
    }

    /// Reset the TTL without rewriting the record.
    pub async fn refresh(&self, id: &str) -> Result<bool, StoreError> {
        self.store.expire(&self.key(id), self.ttl).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(&self.key(id)).await
    }

    /// Remaining lifetime of a session.
    pub async fn remaining(&self, id: &str) -> Result<Option<Duration>, StoreError> {
        self.store.ttl(&self.key(id)).await
    }

    /// Delete every session belonging to `user_id`. Returns how many went.
    pub async fn delete_user_sessions(&self, user_id: u64) -> Result<usize, StoreError> {
        let keys = self
            .store
            .keys_with_prefix(&format!("{}:", self.prefix))
            .await?;

        let mut removed = 0;
        for key in keys {
            match self.read(&key).await? {
                Some(session) if session.user_id == user_id => {
                    self.store.delete(&key).await?;
                    removed += 1;
                }
                _ => {}
            }
        }

        tracing::info!(user_id, removed, "Invalidated user sessions");
        Ok(removed)
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish()
    }
}
