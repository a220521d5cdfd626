//! Caching collected route data between builds.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::collector::{DispatchData, ReverseData};

/// Default cache key.
pub const DEFAULT_CACHE_KEY: &str = "routes";

/// Default time-to-live in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// How long a cache entry stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Valid for a duration from the moment it is written.
    Duration(Duration),
    /// Valid until a point in time.
    Until(DateTime<Utc>),
}

impl CacheTtl {
    /// Returns when an entry written at `now` expires.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::Duration(ttl) => chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Until(at) => at,
        }
    }
}

impl From<Duration> for CacheTtl {
    fn from(ttl: Duration) -> Self {
        Self::Duration(ttl)
    }
}

impl From<DateTime<Utc>> for CacheTtl {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Until(at)
    }
}

/// Where and for how long the router caches its route data.
///
/// Deserializes from e.g. `{"key": "app_routes", "ttl_secs": 300}`; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache key.
    pub key: String,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

impl CacheSettings {
    /// Returns the TTL as a [`CacheTtl`].
    pub fn ttl(&self) -> CacheTtl {
        CacheTtl::Duration(Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// The pair of tables a router is built from.
#[derive(Debug, Clone, Default)]
pub struct CachedRoutes {
    /// Dispatch data.
    pub dispatch: DispatchData,
    /// Reverse data.
    pub reverse: ReverseData,
}

/// A key/value store for [`CachedRoutes`].
pub trait RouteCache: Send + Sync {
    /// Returns whether a live entry exists.
    fn has(&self, key: &str) -> bool;

    /// Returns the live entry, if any.
    fn get(&self, key: &str) -> Option<CachedRoutes>;

    /// Stores an entry.
    fn set(&self, key: &str, routes: CachedRoutes, ttl: CacheTtl);
}

/// An in-process [`RouteCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (CachedRoutes, DateTime<Utc>)>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops an entry.
    pub fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl RouteCache for MemoryCache {
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &str) -> Option<CachedRoutes> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let (routes, expires_at) = entries.get(key)?;
        if *expires_at <= Utc::now() {
            entries.remove(key);
            return None;
        }
        Some(routes.clone())
    }

    fn set(&self, key: &str, routes: CachedRoutes, ttl: CacheTtl) {
        let expires_at = ttl.expires_at(Utc::now());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (routes, expires_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;

    fn routes() -> CachedRoutes {
        let mut collector = Collector::new();
        collector
            .add_route(&["GET"], "/cached", "h", Some("cached"))
            .unwrap();
        CachedRoutes {
            dispatch: collector.dispatch_data().clone(),
            reverse: collector.reverse_data().clone(),
        }
    }

    #[test]
    fn test_set_then_get() {
        let cache = MemoryCache::new();
        assert!(!cache.has("routes"));

        cache.set("routes", routes(), Duration::from_secs(60).into());
        assert!(cache.has("routes"));
        let cached = cache.get("routes").unwrap();
        assert_eq!(cached.dispatch.len(), 1);
        assert!(cached.reverse.contains("cached"));
        assert!(!cache.has("other"));
    }

    #[test]
    fn test_expired_entry_is_gone() {
        let cache = MemoryCache::new();
        let past = Utc::now() - chrono::Duration::seconds(1);
        cache.set("routes", routes(), CacheTtl::Until(past));
        assert!(!cache.has("routes"));
        assert!(cache.get("routes").is_none());
    }

    #[test]
    fn test_remove() {
        let cache = MemoryCache::new();
        cache.set("routes", routes(), Duration::from_secs(60).into());
        cache.remove("routes");
        assert!(!cache.has("routes"));
    }

    #[test]
    fn test_ttl_expiry_computation() {
        let now = Utc::now();
        assert_eq!(
            CacheTtl::Duration(Duration::from_secs(60)).expires_at(now),
            now + chrono::Duration::seconds(60)
        );
        assert_eq!(
            CacheTtl::Duration(Duration::MAX).expires_at(now),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn test_settings_defaults_and_deserialize() {
        let defaults = CacheSettings::default();
        assert_eq!(defaults.key, "routes");
        assert_eq!(defaults.ttl(), CacheTtl::Duration(Duration::from_secs(60)));

        let parsed: CacheSettings = serde_json::from_str(r#"{"key": "app"}"#).unwrap();
        assert_eq!(parsed.key, "app");
        assert_eq!(parsed.ttl_secs, 60);
    }
}
