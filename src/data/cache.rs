//! In-memory aggregate cache
//!
//! Volatile, keyed by record id. A miss is answered with the canonical
//! default so callers always have a structurally valid value to render.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::hydrate::default_of;
use crate::config::CacheConfig;
use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, CACHE_SIZE};

/// Id-keyed cache of validated aggregates
///
/// Bounded by `max_items` and expiring entries after their time to live.
/// Eviction is moka's: size-bounded with TinyLFU admission, so the
/// entry dropped past capacity is not necessarily the oldest.
pub struct AggregateCache<T> {
    name: &'static str,
    entries: Cache<i64, Arc<T>>,
}

impl<T> AggregateCache<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Create a new cache
    ///
    /// # Arguments
    /// * `name` - Label used in cache metrics
    /// * `max_items` - Maximum number of aggregates to keep
    /// * `time_to_live` - How long an entry stays after insertion
    pub fn new(name: &'static str, max_items: usize, time_to_live: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_items.max(1) as u64)
            .time_to_live(time_to_live)
            .build();

        Self { name, entries }
    }

    /// Create a cache sized by the `cache` config section
    pub fn from_config(name: &'static str, config: &CacheConfig) -> Self {
        Self::new(
            name,
            config.max_items,
            Duration::from_secs(config.ttl_seconds),
        )
    }

    pub fn insert(&self, id: i64, value: T) {
        self.entries.insert(id, Arc::new(value));
        tracing::debug!(cache = self.name, id, "Cached aggregate");
        self.record_size();
    }

    pub fn get(&self, id: i64) -> Option<Arc<T>> {
        let result = self.entries.get(&id);

        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[self.name]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&[self.name]).inc();
        }

        result
    }

    /// Cached value, or a fresh default on a miss
    pub fn get_or_default(&self, id: i64) -> T {
        match self.get(id) {
            Some(value) => value.as_ref().clone(),
            None => default_of(),
        }
    }

    pub fn remove(&self, id: i64) -> Option<Arc<T>> {
        let removed = self.entries.remove(&id);
        self.record_size();
        removed
    }

    /// Number of live entries, after pending evictions are applied
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_size(&self) {
        CACHE_SIZE
            .with_label_values(&[self.name])
            .set(self.entries.entry_count() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::aggregates::Gallery;

    const DAY: Duration = Duration::from_secs(86_400);

    #[test]
    fn miss_returns_default() {
        let config = CacheConfig {
            max_items: 4,
            ttl_seconds: 60,
        };
        let cache: AggregateCache<Gallery> = AggregateCache::from_config("test_galleries", &config);
        let gallery = cache.get_or_default(42);
        assert!(gallery.images.is_empty());
        assert!(!gallery.id.is_assigned());
    }

    #[test]
    fn hit_returns_stored_value() {
        let cache = AggregateCache::new("test_galleries_hit", 4, DAY);
        let mut gallery = Gallery::default();
        gallery.title = "Live".to_string();
        cache.insert(1, gallery);

        assert_eq!(cache.get(1).unwrap().title, "Live");
        assert_eq!(cache.get_or_default(1).title, "Live");
        assert!(cache.remove(1).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn stays_within_capacity() {
        let cache: AggregateCache<Gallery> = AggregateCache::new("test_galleries_evict", 2, DAY);
        for id in 0..50 {
            cache.insert(id, Gallery::default());
        }

        assert!(cache.len() <= 2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache: AggregateCache<Gallery> =
            AggregateCache::new("test_galleries_ttl", 4, Duration::from_millis(50));
        cache.insert(1, Gallery::default());
        assert!(cache.get(1).is_some());

        std::thread::sleep(Duration::from_millis(200));
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }
}
