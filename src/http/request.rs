//! Inbound request representation.
//!
//! The embedding server parses the wire format and hands the cache layer a
//! ready-made [`Request`]. The body is a [`Bytes`] buffer, so cloning a
//! request (e.g. to hand one copy to a detached regeneration task) is cheap.

use bytes::Bytes;

use super::{Headers, Method};

/// An inbound HTTP request as seen by the middleware chain.
///
/// Built with a consuming builder; all fields the cache layer fingerprints
/// (method, path, query, body, cookies) are reachable through accessors.
///
/// # Examples
///
/// ```
/// use stampede::http::{Method, Request};
///
/// let req = Request::new(Method::Get, "/symbols")
///     .query("chain=eos")
///     .header("Cookie", "session=abc; theme=dark");
///
/// assert_eq!(req.uri(), "/symbols?chain=eos");
/// assert_eq!(req.cookie("session"), Some("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Creates a request with the given method and path, no query, no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Sets the raw query string (without the leading `?`).
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the path joined with the query string, the form used for
    /// cache-key fingerprinting.
    pub fn uri(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body bytes.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Returns the value of the named cookie, searching every `Cookie` header.
    ///
    /// Cookie pairs are separated by `;` per RFC 6265 §4.2.1. The value is
    /// returned verbatim (no percent-decoding).
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.get_all("cookie").find_map(|header| {
            header.split(';').find_map(|pair| {
                let (k, v) = pair.split_once('=')?;
                (k.trim() == name).then(|| v.trim())
            })
        })
    }
}
