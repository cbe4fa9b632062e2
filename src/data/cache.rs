//! In-memory caches
//!
//! These caches are volatile and cleared on restart.
//! Uses Moka for high-performance concurrent caching.

use moka::future::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::models::ActivityItem;

// =============================================================================
// Activity Cache
// =============================================================================

/// Latest-activity lists, one per pagination choice
///
/// Entries never expire on their own; every board write drops all of them.
/// Each drop bumps a generation counter, and lists built from reads taken
/// before the bump are refused so they cannot outlive the write.
pub struct ActivityCache {
    /// Pagination size -> annotated activity list
    lists: Cache<i64, Arc<Vec<ActivityItem>>>,
    generation: AtomicU64,
}

impl ActivityCache {
    /// Create new activity cache
    pub fn new() -> Self {
        Self {
            lists: Cache::builder().build(),
            generation: AtomicU64::new(0),
        }
    }

    /// Current generation; take it before reading the lists' source data
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Get the list built for a pagination size
    pub async fn get(&self, pagination: i64) -> Option<Arc<Vec<ActivityItem>>> {
        let result = self.lists.get(&pagination).await;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["activity"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["activity"]).inc();
        }

        result
    }

    /// Store the list built for a pagination size
    ///
    /// # Returns
    /// `false` if the cache was invalidated since `generation` was taken,
    /// in which case nothing is kept.
    pub async fn insert(&self, pagination: i64, items: Vec<ActivityItem>, generation: u64) -> bool {
        if generation != self.generation() {
            return false;
        }

        self.lists.insert(pagination, Arc::new(items)).await;

        // An invalidation may have landed between the check and the insert
        if generation != self.generation() {
            self.lists.invalidate(&pagination).await;
            return false;
        }

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&["activity"])
            .set(self.lists.entry_count() as i64);
        true
    }

    /// Drop every cached list
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.lists.invalidate_all();

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE.with_label_values(&["activity"]).set(0);
    }
}

impl Default for ActivityCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Embed Info Cache
// =============================================================================

/// oEmbed metadata for an embedded media link
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmbedInfo {
    pub title: Option<String>,
    pub author_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub thumbnail_url: Option<String>,
}

/// oEmbed lookups keyed by media URL
///
/// Failed lookups are cached as `None` so a dead link is not re-fetched on
/// every page render.
pub struct EmbedInfoCache {
    entries: Cache<String, Option<Arc<EmbedInfo>>>,
}

impl EmbedInfoCache {
    /// Create new embed info cache
    ///
    /// # Arguments
    /// * `ttl_seconds` - How long fetched info stays valid
    pub fn new(ttl_seconds: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();

        Self { entries }
    }

    /// Get cached info; the outer `None` means "not looked up yet"
    pub async fn get(&self, url: &str) -> Option<Option<Arc<EmbedInfo>>> {
        let result = self.entries.get(url).await;

        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};
        if result.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&["embed"]).inc();
        } else {
            CACHE_MISSES_TOTAL.with_label_values(&["embed"]).inc();
        }

        result
    }

    /// Record the outcome of a lookup
    pub async fn insert(&self, url: &str, info: Option<EmbedInfo>) {
        self.entries
            .insert(url.to_string(), info.map(Arc::new))
            .await;

        use crate::metrics::CACHE_SIZE;
        CACHE_SIZE
            .with_label_values(&["embed"])
            .set(self.entries.entry_count() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ActivityKind;
    use chrono::Utc;

    fn item(id: i64) -> ActivityItem {
        ActivityItem {
            kind: ActivityKind::Post,
            id,
            post_id: id,
            post_title: format!("post {id}"),
            username: "alice".to_string(),
            created_at: Utc::now(),
            post_page: 1,
        }
    }

    #[tokio::test]
    async fn activity_cache_is_keyed_by_pagination() {
        let cache = ActivityCache::new();
        let generation = cache.generation();
        assert!(cache.insert(10, vec![item(1)], generation).await);
        assert!(cache.insert(20, vec![item(1), item(2)], generation).await);

        assert_eq!(cache.get(10).await.unwrap().len(), 1);
        assert_eq!(cache.get(20).await.unwrap().len(), 2);
        assert!(cache.get(5).await.is_none());
    }

    #[tokio::test]
    async fn activity_cache_invalidate_all_drops_every_list() {
        let cache = ActivityCache::new();
        let generation = cache.generation();
        cache.insert(10, vec![item(1)], generation).await;
        cache.insert(20, vec![item(1)], generation).await;

        cache.invalidate_all();

        assert!(cache.get(10).await.is_none());
        assert!(cache.get(20).await.is_none());
    }

    #[tokio::test]
    async fn activity_cache_refuses_lists_read_before_invalidation() {
        let cache = ActivityCache::new();
        let before = cache.generation();

        // A write lands while the list is being built
        cache.invalidate_all();

        assert!(!cache.insert(10, vec![item(1)], before).await);
        assert!(cache.get(10).await.is_none());

        assert!(cache.insert(10, vec![item(2)], cache.generation()).await);
        assert_eq!(cache.get(10).await.unwrap()[0].id, 2);
    }

    #[tokio::test]
    async fn embed_cache_remembers_failed_lookups() {
        let cache = EmbedInfoCache::new(60);
        assert!(cache.get("https://youtu.be/x").await.is_none());

        cache.insert("https://youtu.be/x", None).await;
        assert_eq!(cache.get("https://youtu.be/x").await, Some(None));
    }
}
