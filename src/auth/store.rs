//! Key-value storage with per-entry expiry.
//!
//! # Responsibilities
//! - Abstract the session backing store behind one async trait
//! - Provide an in-process implementation for single-node deployments and tests
//!
//! # Design Decisions
//! - The store knows nothing about sessions or routing; values are opaque strings
//! - Expired entries are treated as absent on read and reclaimed lazily, with
//!   a periodic purge for keys that are never read again

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Async key-value store with TTL semantics.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Read a live value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Reset the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Overwrite `key` only while it is still live. Returns false, writing
    /// nothing, if the key is absent.
    async fn replace(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError>;

    /// Remove a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All live keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Remaining lifetime of a live key.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Reclaim expired entries. Backends with native expiry have nothing to do.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// Run `purge_expired` every `interval` until `shutdown` fires.
pub fn spawn_purger(
    store: Arc<dyn SessionStore>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Purged expired session entries"),
                        Err(e) => tracing::warn!(error = %e, "Session store purge failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session store purger received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        // guard released above; safe to remove
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.value = value;
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().is_live(now))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now))
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}
