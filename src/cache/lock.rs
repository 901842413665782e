//! Per-key regeneration locks layered on the store.
//!
//! The lock is a store entry under `"lock:" + key` holding the sentinel `"1"`
//! (locked) or `"0"` (unlocked). An absent key is canonically unlocked, so
//! both store flavors — with and without mandatory expiry — observe the same
//! semantics. Every lock write carries a failsafe TTL: if a regenerator
//! crashes without releasing, the entry self-clears and the worst-case
//! stampede-prevention staleness is bounded by that TTL.
//!
//! The store does not expose a conditional set, so the check-then-set gap can
//! over-admit a second regenerator under heavy contention. That is a bounded
//! inefficiency, not a correctness violation; duplicate regenerations commit
//! the same payload.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::store::Store;

const LOCKED: &[u8] = b"1";
const UNLOCKED: &[u8] = b"0";

/// Outcome of a lock acquisition attempt.
///
/// `already_locked` reports the state observed *before* our own write, which
/// is what distinguishes "I am now the sole regenerator" from "someone else is
/// regenerating".
#[derive(Debug, Clone, Copy)]
pub struct LockAttempt {
    pub already_locked: bool,
}

/// Manages per-key regeneration locks using the store as substrate.
///
/// Store failures are absorbed: a failed read observes "unlocked" and a failed
/// write is logged and ignored. Risking a duplicate regeneration beats wedging
/// all traffic on a dead store.
#[derive(Clone)]
pub struct LockCoordinator {
    store: Arc<dyn Store>,
    failsafe_ttl: Duration,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn Store>, failsafe_ttl: Duration) -> Self {
        Self {
            store,
            failsafe_ttl,
        }
    }

    /// Returns `true` if the lock is currently observed held.
    ///
    /// Absent key and store failure both read as unlocked.
    pub async fn is_locked(&self, lock_key: &str) -> bool {
        match self.store.get(lock_key).await {
            Ok(state) => state.as_deref() == Some(LOCKED),
            Err(error) => {
                warn!(lock_key, %error, "lock read failed; treating as unlocked");
                false
            }
        }
    }

    /// Reads the current lock state and, when unlocked or absent, writes the
    /// locked sentinel with the failsafe TTL.
    ///
    /// Returns whether the lock was observed held before our write.
    pub async fn try_acquire(&self, lock_key: &str) -> LockAttempt {
        let already_locked = self.is_locked(lock_key).await;
        if !already_locked {
            if let Err(error) = self
                .store
                .set(lock_key, Bytes::from_static(LOCKED), Some(self.failsafe_ttl))
                .await
            {
                warn!(lock_key, %error, "lock write failed; proceeding unlocked");
            } else {
                debug!(lock_key, "regeneration lock acquired");
            }
        }
        LockAttempt { already_locked }
    }

    /// Writes the unlocked sentinel. Idempotent; releasing an already-unlocked
    /// lock is a no-op at the protocol level.
    pub async fn release(&self, lock_key: &str) {
        release_inner(&self.store, lock_key, self.failsafe_ttl).await;
    }

    /// Wraps an acquired lock in a guard that guarantees release on every exit
    /// path. Call after a successful [`try_acquire`](Self::try_acquire).
    pub fn guard(&self, lock_key: impl Into<String>) -> LockGuard {
        LockGuard {
            store: Arc::clone(&self.store),
            lock_key: lock_key.into(),
            failsafe_ttl: self.failsafe_ttl,
            released: false,
        }
    }
}

async fn release_inner(store: &Arc<dyn Store>, lock_key: &str, ttl: Duration) {
    if let Err(error) = store
        .set(lock_key, Bytes::from_static(UNLOCKED), Some(ttl))
        .await
    {
        warn!(lock_key, %error, "lock release failed; failsafe TTL will clear it");
    } else {
        debug!(lock_key, "regeneration lock released");
    }
}

/// Scoped lock release.
///
/// Prefer the explicit [`release`](Self::release) on normal completion. If the
/// guard is dropped without it — the regeneration future panicked or was
/// cancelled — the unlock write is spawned onto the current runtime so the
/// lock still returns to unlocked ahead of its failsafe TTL.
pub struct LockGuard {
    store: Arc<dyn Store>,
    lock_key: String,
    failsafe_ttl: Duration,
    released: bool,
}

impl LockGuard {
    /// Writes the unlocked sentinel and disarms the drop fallback.
    pub async fn release(mut self) {
        release_inner(&self.store, &self.lock_key, self.failsafe_ttl).await;
        self.released = true;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let lock_key = std::mem::take(&mut self.lock_key);
        let ttl = self.failsafe_ttl;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(%lock_key, "lock guard dropped without release; unlocking");
                handle.spawn(async move {
                    release_inner(&store, &lock_key, ttl).await;
                });
            }
            Err(_) => {
                // No runtime to spawn on; the failsafe TTL bounds the damage.
                warn!(%lock_key, "lock guard dropped outside a runtime; relying on TTL");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;

    const TTL: Duration = Duration::from_secs(600);

    fn coordinator() -> (Arc<MemoryStore>, LockCoordinator) {
        let store = Arc::new(MemoryStore::new());
        let lock = LockCoordinator::new(store.clone(), TTL);
        (store, lock)
    }

    #[tokio::test]
    async fn absent_key_reads_unlocked() {
        let (_store, lock) = coordinator();
        assert!(!lock.is_locked("lock:k").await);
    }

    #[tokio::test]
    async fn first_acquire_wins_second_observes_locked() {
        let (_store, lock) = coordinator();
        let first = lock.try_acquire("lock:k").await;
        assert!(!first.already_locked);
        let second = lock.try_acquire("lock:k").await;
        assert!(second.already_locked);
    }

    #[tokio::test]
    async fn release_reopens_the_lock() {
        let (store, lock) = coordinator();
        lock.try_acquire("lock:k").await;
        lock.release("lock:k").await;
        assert!(!lock.is_locked("lock:k").await);
        assert_eq!(
            store.get("lock:k").await.unwrap(),
            Some(Bytes::from_static(b"0"))
        );

        let again = lock.try_acquire("lock:k").await;
        assert!(!again.already_locked);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (_store, lock) = coordinator();
        lock.release("lock:k").await;
        lock.release("lock:k").await;
        assert!(!lock.is_locked("lock:k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_lock_self_clears_after_ttl() {
        let (_store, lock) = coordinator();
        lock.try_acquire("lock:k").await;
        assert!(lock.is_locked("lock:k").await);

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(!lock.is_locked("lock:k").await);
    }

    #[tokio::test]
    async fn guard_release_unlocks() {
        let (_store, lock) = coordinator();
        lock.try_acquire("lock:k").await;
        let guard = lock.guard("lock:k");
        guard.release().await;
        assert!(!lock.is_locked("lock:k").await);
    }

    #[tokio::test]
    async fn dropped_guard_spawns_unlock() {
        let (_store, lock) = coordinator();
        lock.try_acquire("lock:k").await;
        drop(lock.guard("lock:k"));

        // Let the spawned unlock task run.
        tokio::task::yield_now().await;
        assert!(!lock.is_locked("lock:k").await);
    }

    struct DeadStore;

    #[async_trait]
    impl Store for DeadStore {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set(
            &self,
            _key: &str,
            _value: Bytes,
            _ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn dead_store_degrades_to_unlocked() {
        let lock = LockCoordinator::new(Arc::new(DeadStore), TTL);
        assert!(!lock.is_locked("lock:k").await);
        let attempt = lock.try_acquire("lock:k").await;
        assert!(!attempt.already_locked);
        lock.release("lock:k").await; // must not panic
    }
}
