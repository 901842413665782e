//! Request-response caching with stampede prevention.
//!
//! Serves previously computed responses for repeated requests and guarantees
//! that concurrent identical requests never all fall through to the backend:
//! at most one caller per key regenerates at a time, enforced by a store-backed
//! lock with a failsafe TTL.
//!
//! ## Pieces
//!
//! - [`CacheMiddleware`] — the coordinator; plugs into the
//!   [`middleware`](crate::middleware) pipeline.
//! - [`CacheConfig`] — per-route freshness window, TTLs, and switches.
//! - Key derivers ([`url_key`], [`url_body_key`], [`url_cookie_key`]) — map a
//!   request to a stable cache key.
//! - [`LockCoordinator`] / [`LockGuard`] — per-key regeneration locks.
//! - [`FreshnessPolicy`] — staleness decisions over the last-refresh
//!   timestamp.
//! - [`Envelope`] — the fixed `{errno, errmsg, data}` JSON response shape.
//! - [`CapturedResponse`] — read-only view over a downstream response for
//!   commit decisions.
//!
//! ## Behavior in one paragraph
//!
//! A fresh cached entry is served directly. A stale entry is still served
//! immediately (stale-while-revalidate) while the serving request takes the
//! lock and regenerates, synchronously by default or detached via
//! [`CacheConfig::background_refresh`]. A cold key under a held lock yields
//! the [`Envelope::retry`] placeholder with transport status 200. Only
//! HTTP 200 responses whose body parses as an [`Envelope`] and passes the
//! [`ShouldCache`] predicate are committed.

mod capture;
mod config;
mod envelope;
mod freshness;
mod key;
mod lock;
mod middleware;

pub use capture::CapturedResponse;
pub use config::{CacheConfig, DEFAULT_LOCK_TTL};
pub use envelope::{ERRNO_RETRY, ERRNO_SUCCESS, Envelope, ShouldCache, default_should_cache};
pub use freshness::{Clock, FreshnessPolicy, system_clock};
pub use key::{
    KeyFn, LOCK_PREFIX, REFRESH_PREFIX, lock_key, refresh_key, url_body_key, url_cookie_key,
    url_key,
};
pub use lock::{LockAttempt, LockCoordinator, LockGuard};
pub use middleware::CacheMiddleware;
