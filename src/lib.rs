//! # stampede
//!
//! Stampede-safe HTTP response caching middleware.
//!
//! Sits between an HTTP handler and the backend logic it protects: repeated
//! requests are served from a shared key-value store, concurrent identical
//! requests are collapsed onto a single backend invocation, and stale entries
//! are refreshed on a time-to-live policy without ever opening a window where
//! a burst of callers regenerates the same key in parallel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use stampede::{
//!     Method, Request, Response, StatusCode,
//!     cache::{CacheConfig, CacheMiddleware, Envelope, url_key},
//!     middleware::{Next, from_handler, from_middleware},
//!     store::MemoryStore,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(MemoryStore::new());
//!     let cache = CacheMiddleware::new(
//!         store,
//!         CacheConfig::new(Duration::from_secs(30)),
//!         url_key(),
//!     );
//!
//!     let chain = vec![
//!         from_middleware(Arc::new(cache)),
//!         from_handler(|_req| async {
//!             let data = serde_json::json!({"symbol": "EOS", "balance": "2.7937"});
//!             Response::json(StatusCode::Ok, &Envelope::success(data))
//!         }),
//!     ];
//!
//!     let response = Next::new(chain)
//!         .run(Request::new(Method::Get, "/symbols"))
//!         .await;
//!     assert_eq!(response.status(), StatusCode::Ok);
//! }
//! ```
//!
//! The HTTP transport itself is out of scope: the embedding server parses the
//! wire format into a [`Request`], runs the middleware chain, and serializes
//! the returned [`Response`]. Coordination state lives entirely in the
//! [`store::Store`] backend, so any number of process instances behind a load
//! balancer share one cache and one lock space.

pub mod cache;
pub mod http;
pub mod middleware;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheConfig, CacheMiddleware, Envelope};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use store::{MemoryStore, Store, StoreError};
