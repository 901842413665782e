//! Key-value store abstraction backing all cache coordination state.
//!
//! The store is the single source of truth for cached bodies, regeneration
//! locks, and refresh timestamps — multiple process instances behind a load
//! balancer coordinate exclusively through it, so no in-process mutex is
//! involved in cache decisions.
//!
//! Two kinds of backends are expected in production: one that requires every
//! entry to carry an expiry and one that allows indefinite entries. The trait
//! models both with `ttl: Option<Duration>`; backends with mandatory expiry
//! are driven by always supplying `Some` via
//! [`CacheConfig::store_entry_ttl`](crate::cache::CacheConfig).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Errors produced by a store backend.
///
/// The cache layer never surfaces these to a client: every store failure is
/// logged and degraded to a miss / unlocked observation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Abstract key-value interface with get/set/exists semantics.
///
/// Implementations must be safe to share across tasks; all methods take
/// `&self`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the value stored under `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Writes `value` under `key`. `ttl: None` stores the entry indefinitely;
    /// `Some(d)` lets it expire after `d`.
    async fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Returns `true` if a live (non-expired) entry exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}
