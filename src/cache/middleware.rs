//! The cache coordinator middleware.
//!
//! Orchestrates key derivation, the regeneration lock, the freshness policy,
//! and the store around a single request. Each request resolves to one of:
//!
//! 1. **Disabled** — caching off, straight pass-through.
//! 2. **Hit, fresh** — cached entry present and either not stale or someone
//!    else is already regenerating: serve the cached bytes immediately.
//! 3. **Hit, stale takeover** — cached entry stale and unlocked: serve the
//!    stale bytes (callers never wait on regeneration), take the lock, and
//!    regenerate — on this request by default, detached when
//!    [`CacheConfig::background_refresh`] is set.
//! 4. **Miss, locked** — no cached entry and another request is regenerating:
//!    serve the retry envelope with transport status 200.
//! 5. **Miss, regenerate** — take the lock, invoke the wrapped handler,
//!    commit the captured response if it qualifies, release the lock.
//!
//! A cached value always beats waiting: the client-facing path never blocks
//! on lock resolution. The only blocking work is the handler invocation
//! itself, carried by the single regenerating request.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tracing::{debug, warn};

use crate::{
    Request, Response, StatusCode,
    middleware::{Middleware, Next},
    store::Store,
};

use super::{
    capture::CapturedResponse,
    config::CacheConfig,
    envelope::{Envelope, ShouldCache, default_should_cache},
    freshness::{Clock, FreshnessPolicy},
    key::{KeyFn, lock_key, refresh_key},
    lock::{LockCoordinator, LockGuard},
};

/// Response-caching middleware with stampede prevention.
///
/// All coordination state (cached body, lock, refresh timestamp) lives in the
/// shared store, so multiple process instances behind a load balancer
/// coordinate correctly without any in-process synchronization.
///
/// # Examples
///
/// ```rust,no_run
/// use std::{sync::Arc, time::Duration};
/// use stampede::{
///     cache::{CacheConfig, CacheMiddleware, url_key},
///     store::MemoryStore,
/// };
///
/// let store = Arc::new(MemoryStore::new());
/// let cache = CacheMiddleware::new(store, CacheConfig::new(Duration::from_secs(30)), url_key());
/// ```
pub struct CacheMiddleware {
    store: Arc<dyn Store>,
    config: CacheConfig,
    key_fn: KeyFn,
    should_cache: ShouldCache,
    lock: LockCoordinator,
    freshness: FreshnessPolicy,
}

impl CacheMiddleware {
    /// Creates a coordinator over `store` with the default cache predicate
    /// (`errno == 0`).
    pub fn new(store: Arc<dyn Store>, config: CacheConfig, key_fn: KeyFn) -> Self {
        let lock = LockCoordinator::new(Arc::clone(&store), config.lock_ttl);
        let freshness = FreshnessPolicy::new(Arc::clone(&store), config.refresh_ttl);
        Self {
            store,
            config,
            key_fn,
            should_cache: default_should_cache(),
            lock,
            freshness,
        }
    }

    /// Replaces the commit predicate.
    #[must_use]
    pub fn should_cache(mut self, predicate: ShouldCache) -> Self {
        self.should_cache = predicate;
        self
    }

    /// Replaces the freshness time source. Intended for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.freshness = self.freshness.with_clock(clock);
        self
    }
}

// Everything a regeneration needs once it owns the lock. Cloneable so the
// background-refresh variant can move it into a detached task.
#[derive(Clone)]
struct Regeneration {
    store: Arc<dyn Store>,
    freshness: FreshnessPolicy,
    should_cache: ShouldCache,
    entry_ttl: Option<Duration>,
    cache_key: String,
    ts_key: String,
}

impl Regeneration {
    /// Invokes the wrapped handler and commits the captured response when it
    /// qualifies. The handler's response is returned untouched either way.
    ///
    /// Commit rules: non-200 or empty body commits nothing; an unparseable
    /// body commits nothing; a parseable envelope always advances the refresh
    /// timestamp (so uncacheable responses cannot re-trigger regeneration
    /// storms tighter than the freshness window) and is written to the store
    /// only when the predicate approves it. The lock is released on every
    /// path; `guard` covers panic and cancellation of the handler itself.
    async fn run(self, req: Request, next: Next, guard: LockGuard) -> Response {
        let response = next.run(req).await;

        let captured = CapturedResponse::from_response(&response);
        if !captured.is_ok_with_body() {
            debug!(
                cache_key = %self.cache_key,
                status = response.status().as_u16(),
                "handler response not cacheable; skipping commit"
            );
            guard.release().await;
            return response;
        }

        let Some(envelope) = captured.parse_envelope() else {
            debug!(cache_key = %self.cache_key, "handler body is not an envelope; skipping commit");
            guard.release().await;
            return response;
        };

        if (self.should_cache)(&envelope) {
            if let Err(error) = self
                .store
                .set(&self.cache_key, captured.to_bytes(), self.entry_ttl)
                .await
            {
                warn!(cache_key = %self.cache_key, %error, "cache write failed");
            } else {
                debug!(cache_key = %self.cache_key, "cached regenerated response");
            }
        } else {
            debug!(
                cache_key = %self.cache_key,
                errno = envelope.errno,
                "predicate declined response; advancing refresh time only"
            );
        }
        self.freshness.mark_refreshed(&self.ts_key).await;
        guard.release().await;
        response
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let key_fn = Arc::clone(&self.key_fn);
        let should_cache = Arc::clone(&self.should_cache);
        let lock = self.lock.clone();
        let freshness = self.freshness.clone();

        Box::pin(async move {
            if !config.enabled {
                return next.run(req).await;
            }
            let Some(cache_key) = key_fn(&req) else {
                return next.run(req).await;
            };
            let lock_key = lock_key(&cache_key);
            let ts_key = refresh_key(&cache_key);

            let cached = match store.get(&cache_key).await {
                Ok(value) => value,
                Err(error) => {
                    warn!(%cache_key, %error, "cache read failed; treating as miss");
                    None
                }
            };
            // A stored entry that no longer parses as an envelope is a miss
            // and gets regenerated rather than served.
            let cached = cached.filter(|body| {
                let ok = serde_json::from_slice::<Envelope>(body).is_ok();
                if !ok {
                    debug!(%cache_key, "malformed cached entry; regenerating");
                }
                ok
            });
            let locked = lock.is_locked(&lock_key).await;

            let regen = Regeneration {
                store,
                freshness: freshness.clone(),
                should_cache,
                entry_ttl: config.store_entry_ttl,
                cache_key: cache_key.clone(),
                ts_key: ts_key.clone(),
            };

            if let Some(body) = cached {
                let stale = freshness.is_stale(&ts_key, config.cache_time).await;
                if locked || !stale {
                    debug!(%cache_key, outcome = "hit_fresh", "serving cached response");
                    return Response::json_bytes(StatusCode::Ok, body);
                }

                let attempt = lock.try_acquire(&lock_key).await;
                if attempt.already_locked {
                    // Another regenerator slipped in between our two reads;
                    // the cached value still beats waiting.
                    return Response::json_bytes(StatusCode::Ok, body);
                }
                debug!(%cache_key, outcome = "hit_stale_takeover", "serving stale, regenerating");
                let guard = lock.guard(&lock_key);
                if config.background_refresh {
                    tokio::spawn(regen.run(req, next, guard));
                } else {
                    // The regenerated response only feeds the store; this
                    // caller gets the stale bytes it was promised.
                    let _ = regen.run(req, next, guard).await;
                }
                return Response::json_bytes(StatusCode::Ok, body);
            }

            if locked {
                debug!(%cache_key, outcome = "miss_locked", "serving retry placeholder");
                return Response::json(StatusCode::Ok, &Envelope::retry());
            }
            let attempt = lock.try_acquire(&lock_key).await;
            if attempt.already_locked {
                return Response::json(StatusCode::Ok, &Envelope::retry());
            }
            debug!(%cache_key, outcome = "miss_regenerate", "invoking wrapped handler");
            let guard = lock.guard(&lock_key);
            regen.run(req, next, guard).await
        })
    }
}
