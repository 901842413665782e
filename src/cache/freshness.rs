//! Staleness decisions over the last-refresh timestamp.
//!
//! The refresh timestamp lives in the store under
//! `"request_cache_time:" + key` as a decimal unix timestamp. It is written on
//! every regeneration attempt that produced a parseable envelope (cacheable or
//! not) and only ever moves forward; staleness is a comparison against it,
//! independent of whatever expiry the store applies to the cached payload.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tracing::warn;

use crate::store::Store;

/// Injectable unix-time source. Production uses [`system_clock`]; tests pin
/// the clock to drive staleness deterministically.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall-clock seconds since the unix epoch.
pub fn system_clock() -> Clock {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    })
}

/// Decides whether a cached entry is due for regeneration.
#[derive(Clone)]
pub struct FreshnessPolicy {
    store: Arc<dyn Store>,
    refresh_ttl: Option<Duration>,
    clock: Clock,
}

impl FreshnessPolicy {
    pub fn new(store: Arc<dyn Store>, refresh_ttl: Option<Duration>) -> Self {
        Self {
            store,
            refresh_ttl,
            clock: system_clock(),
        }
    }

    /// Replaces the time source. Intended for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns `true` when the entry behind `ts_key` should be refreshed.
    ///
    /// An absent, unreadable, or non-numeric timestamp forces a refresh;
    /// otherwise the entry is stale iff `now - last_refresh >= cache_time`.
    pub async fn is_stale(&self, ts_key: &str, cache_time: Duration) -> bool {
        let last_refresh = match self.store.get(ts_key).await {
            Ok(Some(raw)) => parse_timestamp(&raw),
            Ok(None) => None,
            Err(error) => {
                warn!(ts_key, %error, "refresh timestamp read failed; forcing refresh");
                None
            }
        };
        match last_refresh {
            Some(last) => {
                let now = (self.clock)();
                now.saturating_sub(last) >= cache_time.as_secs()
            }
            None => true,
        }
    }

    /// Records `now` as the last refresh time, with the bookkeeping TTL.
    pub async fn mark_refreshed(&self, ts_key: &str) {
        let now = (self.clock)();
        if let Err(error) = self
            .store
            .set(ts_key, Bytes::from(now.to_string()), self.refresh_ttl)
            .await
        {
            warn!(ts_key, %error, "refresh timestamp write failed");
        }
    }
}

fn parse_timestamp(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    const TS_KEY: &str = "request_cache_time:k";
    const WINDOW: Duration = Duration::from_secs(30);

    fn fixed_clock(now: Arc<AtomicU64>) -> Clock {
        Arc::new(move || now.load(Ordering::SeqCst))
    }

    fn policy(now: Arc<AtomicU64>) -> (Arc<MemoryStore>, FreshnessPolicy) {
        let store = Arc::new(MemoryStore::new());
        let policy = FreshnessPolicy::new(store.clone(), None).with_clock(fixed_clock(now));
        (store, policy)
    }

    #[tokio::test]
    async fn absent_timestamp_is_stale() {
        let (_store, policy) = policy(Arc::new(AtomicU64::new(1_000)));
        assert!(policy.is_stale(TS_KEY, WINDOW).await);
    }

    #[tokio::test]
    async fn garbage_timestamp_is_stale() {
        let (store, policy) = policy(Arc::new(AtomicU64::new(1_000)));
        store
            .set(TS_KEY, Bytes::from_static(b"not-a-number"), None)
            .await
            .unwrap();
        assert!(policy.is_stale(TS_KEY, WINDOW).await);
    }

    #[tokio::test]
    async fn fresh_within_window() {
        let now = Arc::new(AtomicU64::new(1_000));
        let (_store, policy) = policy(now.clone());
        policy.mark_refreshed(TS_KEY).await;

        now.store(1_029, Ordering::SeqCst);
        assert!(!policy.is_stale(TS_KEY, WINDOW).await);
    }

    #[tokio::test]
    async fn stale_at_window_boundary() {
        let now = Arc::new(AtomicU64::new(1_000));
        let (_store, policy) = policy(now.clone());
        policy.mark_refreshed(TS_KEY).await;

        now.store(1_030, Ordering::SeqCst);
        assert!(policy.is_stale(TS_KEY, WINDOW).await);
    }

    #[tokio::test]
    async fn timestamp_behind_clock_never_underflows() {
        let now = Arc::new(AtomicU64::new(2_000));
        let (store, policy) = policy(now.clone());
        store.set(TS_KEY, Bytes::from_static(b"5000"), None).await.unwrap();

        // A future timestamp reads as fresh, not as an underflowed huge age.
        assert!(!policy.is_stale(TS_KEY, WINDOW).await);
    }

    #[tokio::test]
    async fn mark_refreshed_advances_the_timestamp() {
        let now = Arc::new(AtomicU64::new(1_000));
        let (store, policy) = policy(now.clone());
        policy.mark_refreshed(TS_KEY).await;
        assert_eq!(
            store.get(TS_KEY).await.unwrap(),
            Some(Bytes::from_static(b"1000"))
        );

        now.store(1_500, Ordering::SeqCst);
        policy.mark_refreshed(TS_KEY).await;
        assert_eq!(
            store.get(TS_KEY).await.unwrap(),
            Some(Bytes::from_static(b"1500"))
        );
    }
}
