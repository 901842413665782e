//! Middleware pipeline — composable before/after request handler logic.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling handlers
//! to infrastructure concerns. The cache coordinator in [`crate::cache`] is
//! implemented as one such middleware.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`]
//!   to advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`from_handler`] — wraps a terminal async handler as the innermost chain
//!   entry.
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`] implementation.
/// Calling [`Next::run`] advances the cursor by one position and invokes the
/// next middleware (or returns a fallback `500` response when the chain is
/// exhausted without any middleware generating a response).
///
/// `Next` is consumed on each call to [`run`](Self::run), so a single
/// middleware invocation can forward the request at most once. It is `Send`
/// and `'static`, which lets a middleware move the remainder of the chain into
/// a detached task (the cache layer's background regeneration relies on this).
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use stampede::{Request, Response, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         req: Request,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(req).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] wrapper makes handlers cheap to clone so that [`Next`] can
/// advance through the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stampede::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |req: Request, next: Next| middleware.handle(req, next))
}

/// Wraps a terminal async handler function as the innermost chain entry.
///
/// The handler never receives a usable `Next`; it is expected to produce the
/// response itself (the "wrapped handler" the cache layer protects).
///
/// # Examples
///
/// ```rust,no_run
/// use stampede::{Response, StatusCode, middleware::from_handler};
///
/// let handler = from_handler(|_req| async {
///     Response::new(StatusCode::Ok).body("Hello")
/// });
/// ```
pub fn from_handler<H, F>(handler: H) -> MiddlewareHandler
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |req: Request, _next: Next| {
        let handler = Arc::clone(&handler);
        Box::pin(async move { handler(req).await })
    })
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the current
    /// position, and awaits it. If no handler remains (i.e. the chain is
    /// exhausted without producing a response), a `500 Internal Server Error`
    /// response is returned as a safe fallback.
    pub async fn run(mut self, req: Request) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(req, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all stampede middleware.
///
/// Implementors receive a [`Request`] and a [`Next`] cursor. They may:
///
/// - **Pass through** — call `next.run(req).await` without modification.
/// - **Short-circuit** — return a [`Response`] directly without calling `next`.
/// - **Decorate** — call `next.run(req).await`, inspect the response, and
///   return a modified copy.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because middleware is shared
///   across Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future so it can be awaited
///   across `.await` points in multi-threaded runtimes.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Built-in middleware that logs each request's method, path, status, and duration.
///
/// Emits a single `tracing::info!` line after the downstream handler completes.
/// `LoggerMiddleware` does not short-circuit; it always delegates to the next
/// middleware and decorates the response timing after the fact.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, req: Request, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().as_str().to_string();
            let path = req.path().to_string();

            let response = next.run(req).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();

            tracing::info!("{} {} - {} ({:?})", method, path, status, duration);

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, StatusCode};

    fn terminal(body: &'static str) -> MiddlewareHandler {
        from_handler(move |_req| async move { Response::new(StatusCode::Ok).body(body) })
    }

    #[tokio::test]
    async fn exhausted_chain_falls_back_to_500() {
        let next = Next::new(vec![]);
        let response = next.run(Request::new(Method::Get, "/")).await;
        assert_eq!(response.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn terminal_handler_produces_response() {
        let next = Next::new(vec![terminal("hello")]);
        let response = next.run(Request::new(Method::Get, "/")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_bytes(), b"hello");
    }

    #[tokio::test]
    async fn middleware_decorates_downstream_response() {
        struct Tagger;
        impl Middleware for Tagger {
            fn handle(
                &self,
                req: Request,
                next: Next,
            ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
                Box::pin(async move {
                    let mut response = next.run(req).await;
                    response.add_header("X-Tagged", "yes");
                    response
                })
            }
        }

        let next = Next::new(vec![from_middleware(Arc::new(Tagger)), terminal("ok")]);
        let response = next.run(Request::new(Method::Get, "/")).await;
        assert_eq!(response.headers().get("x-tagged"), Some("yes"));
        assert_eq!(response.body_bytes(), b"ok");
    }

    #[tokio::test]
    async fn logger_passes_through() {
        let next = Next::new(vec![
            from_middleware(Arc::new(LoggerMiddleware)),
            terminal("logged"),
        ]);
        let response = next.run(Request::new(Method::Get, "/ping")).await;
        assert_eq!(response.body_bytes(), b"logged");
    }
}
