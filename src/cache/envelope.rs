//! The application response envelope.
//!
//! Cached endpoints speak a fixed JSON shape:
//!
//! ```json
//! { "errno": 0, "errmsg": "Success", "data": { } }
//! ```
//!
//! `errno == 0` signals "success, cacheable". The distinguished retry errno is
//! used for the placeholder served while another request holds the
//! regeneration lock; it ships with transport status 200 so intermediate
//! caches and CDNs treat it as a normal response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Application-level success code.
pub const ERRNO_SUCCESS: i64 = 0;

/// Application-level "locked, try again later" code.
pub const ERRNO_RETRY: i64 = 255;

/// The fixed response envelope produced and consumed by cached endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub errno: i64,
    pub errmsg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// A success envelope carrying `data`.
    pub fn success(data: Value) -> Self {
        Self {
            errno: ERRNO_SUCCESS,
            errmsg: "Success".to_owned(),
            data: Some(data),
        }
    }

    /// The placeholder served to callers that observe a held regeneration
    /// lock with no cached entry to fall back on.
    pub fn retry() -> Self {
        Self {
            errno: ERRNO_RETRY,
            errmsg: "Try again later".to_owned(),
            data: Some(json!([])),
        }
    }

    /// Returns `true` if this envelope carries the success code.
    pub fn is_success(&self) -> bool {
        self.errno == ERRNO_SUCCESS
    }
}

/// Predicate deciding whether a captured envelope should be committed to the
/// cache.
pub type ShouldCache = Arc<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// The default predicate: cache iff `errno == ERRNO_SUCCESS`.
pub fn default_should_cache() -> ShouldCache {
    Arc::new(Envelope::is_success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_deep_equal() {
        let envelope = Envelope::success(json!({
            "symbol_list": {"symbol": "EOS", "balance": "2.7937"}
        }));
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let back: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn retry_shape() {
        let retry = Envelope::retry();
        assert_eq!(retry.errno, ERRNO_RETRY);
        assert_eq!(retry.errmsg, "Try again later");
        assert_eq!(retry.data, Some(json!([])));
        assert!(!retry.is_success());
    }

    #[test]
    fn data_omitted_when_none() {
        let envelope = Envelope {
            errno: ERRNO_SUCCESS,
            errmsg: "Success".to_owned(),
            data: None,
        };
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(!text.contains("data"));
    }

    #[test]
    fn default_predicate_follows_errno() {
        let pred = default_should_cache();
        assert!(pred(&Envelope::success(json!(null))));
        assert!(!pred(&Envelope::retry()));
    }
}
