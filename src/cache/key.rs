//! Cache-key derivation.
//!
//! A key deriver is a pure function from a [`Request`] to a stable cache key
//! string. Returning `None` declines the request entirely (wrong method, no
//! body where one is required) and the middleware passes it through untouched.
//!
//! Keys are SHA-256 hex fingerprints of the request attributes; the lock and
//! refresh-timestamp keys are derived from the cache key by prefixing.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::{Method, Request};

/// Prefix for per-key regeneration lock entries.
pub const LOCK_PREFIX: &str = "lock:";

/// Prefix for per-key last-refresh timestamp entries.
pub const REFRESH_PREFIX: &str = "request_cache_time:";

/// A pluggable key-derivation function.
///
/// `None` means the request is not cacheable under this deriver and must be
/// passed through to the handler with no cache side effects.
pub type KeyFn = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// Returns the lock key for a cache key.
pub fn lock_key(cache_key: &str) -> String {
    format!("{LOCK_PREFIX}{cache_key}")
}

/// Returns the refresh-timestamp key for a cache key.
pub fn refresh_key(cache_key: &str) -> String {
    format!("{REFRESH_PREFIX}{cache_key}")
}

/// Deriver for GET endpoints: fingerprints the method and full URI
/// (path + query).
pub fn url_key() -> KeyFn {
    Arc::new(|req: &Request| {
        if req.method() != &Method::Get {
            return None;
        }
        Some(fingerprint(&[req.method().as_str().as_bytes(), req.uri().as_bytes()]))
    })
}

/// Deriver for POST endpoints: fingerprints the method, full URI, and request
/// body, so distinct payloads against one URL cache independently.
pub fn url_body_key() -> KeyFn {
    Arc::new(|req: &Request| {
        if req.method() != &Method::Post || req.body_bytes().is_empty() {
            return None;
        }
        Some(fingerprint(&[
            req.method().as_str().as_bytes(),
            req.uri().as_bytes(),
            req.body_bytes().as_ref(),
        ]))
    })
}

/// Deriver for GET endpoints whose responses vary by cookie: fingerprints the
/// method, full URI, and the values of the named cookies (absent cookies
/// contribute an empty value, so presence still changes the key).
pub fn url_cookie_key(names: &[&str]) -> KeyFn {
    let names: Vec<String> = names.iter().map(|n| (*n).to_owned()).collect();
    Arc::new(move |req: &Request| {
        if req.method() != &Method::Get {
            return None;
        }
        let mut parts: Vec<Vec<u8>> = vec![
            req.method().as_str().as_bytes().to_vec(),
            req.uri().into_bytes(),
        ];
        for name in &names {
            parts.push(name.as_bytes().to_vec());
            parts.push(req.cookie(name).unwrap_or("").as_bytes().to_vec());
        }
        let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        Some(fingerprint(&refs))
    })
}

/// SHA-256 hex digest over the concatenation of `parts`, with a length prefix
/// per part so adjacent fields cannot collide by shifting bytes between them.
fn fingerprint(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn url_key_is_stable() {
        let deriver = url_key();
        let a = deriver(&Request::new(Method::Get, "/test").query("a=1"));
        let b = deriver(&Request::new(Method::Get, "/test").query("a=1"));
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn url_key_varies_by_query() {
        let deriver = url_key();
        let a = deriver(&Request::new(Method::Get, "/test").query("a=1"));
        let b = deriver(&Request::new(Method::Get, "/test").query("a=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn url_key_declines_post() {
        let deriver = url_key();
        assert_eq!(deriver(&Request::new(Method::Post, "/test")), None);
    }

    #[test]
    fn body_key_varies_by_payload() {
        let deriver = url_body_key();
        let a = deriver(&Request::new(Method::Post, "/q").body(Bytes::from("x=1")));
        let b = deriver(&Request::new(Method::Post, "/q").body(Bytes::from("x=2")));
        assert_ne!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn body_key_declines_empty_body() {
        let deriver = url_body_key();
        assert_eq!(deriver(&Request::new(Method::Post, "/q")), None);
    }

    #[test]
    fn cookie_key_varies_by_cookie_value() {
        let deriver = url_cookie_key(&["session"]);
        let a = deriver(&Request::new(Method::Get, "/me").header("Cookie", "session=alice"));
        let b = deriver(&Request::new(Method::Get, "/me").header("Cookie", "session=bob"));
        let c = deriver(&Request::new(Method::Get, "/me"));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(c.is_some());
    }

    #[test]
    fn lock_and_refresh_keys_are_prefixed() {
        assert_eq!(lock_key("abc"), "lock:abc");
        assert_eq!(refresh_key("abc"), "request_cache_time:abc");
    }

    #[test]
    fn fingerprint_length_prefix_prevents_boundary_shifts() {
        assert_ne!(
            fingerprint(&[b"ab".as_slice(), b"c".as_slice()]),
            fingerprint(&[b"a".as_slice(), b"bc".as_slice()]),
        );
    }
}
