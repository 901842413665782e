//! Per-route cache configuration.

use std::time::Duration;

/// Failsafe TTL applied to lock entries so an abandoned lock self-clears.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// Configuration for one cached route registration.
///
/// Built with a consuming builder; only the freshness window is required.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use stampede::cache::CacheConfig;
///
/// let config = CacheConfig::new(Duration::from_secs(30))
///     .store_entry_ttl(Some(Duration::from_secs(3600)))
///     .background_refresh(true);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Process-wide kill switch; disabled means straight pass-through.
    pub enabled: bool,
    /// Business freshness window: a cached entry older than this is stale.
    pub cache_time: Duration,
    /// Failsafe TTL on lock entries.
    pub lock_ttl: Duration,
    /// Expiry for cached payloads. `None` stores them indefinitely; backends
    /// with mandatory expiry need `Some`.
    pub store_entry_ttl: Option<Duration>,
    /// Expiry for the refresh-timestamp bookkeeping entry, independent of the
    /// payload TTL.
    pub refresh_ttl: Option<Duration>,
    /// When `true`, a stale hit detaches regeneration to a background task
    /// instead of completing it on the serving request.
    pub background_refresh: bool,
}

impl CacheConfig {
    pub fn new(cache_time: Duration) -> Self {
        Self {
            enabled: true,
            cache_time,
            lock_ttl: DEFAULT_LOCK_TTL,
            store_entry_ttl: None,
            refresh_ttl: None,
            background_refresh: false,
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    #[must_use]
    pub fn store_entry_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.store_entry_ttl = ttl;
        self
    }

    #[must_use]
    pub fn refresh_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn background_refresh(mut self, background: bool) -> Self {
        self.background_refresh = background;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CacheConfig::new(Duration::from_secs(30));
        assert!(config.enabled);
        assert_eq!(config.cache_time, Duration::from_secs(30));
        assert_eq!(config.lock_ttl, DEFAULT_LOCK_TTL);
        assert_eq!(config.store_entry_ttl, None);
        assert_eq!(config.refresh_ttl, None);
        assert!(!config.background_refresh);
    }

    #[test]
    fn builder_overrides() {
        let config = CacheConfig::new(Duration::from_secs(5))
            .enabled(false)
            .lock_ttl(Duration::from_secs(60))
            .store_entry_ttl(Some(Duration::from_secs(120)))
            .refresh_ttl(Some(Duration::from_secs(240)))
            .background_refresh(true);
        assert!(!config.enabled);
        assert_eq!(config.lock_ttl, Duration::from_secs(60));
        assert_eq!(config.store_entry_ttl, Some(Duration::from_secs(120)));
        assert_eq!(config.refresh_ttl, Some(Duration::from_secs(240)));
        assert!(config.background_refresh);
    }
}
