//! Read-through cache for the per-affiliate employer listing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

const MAX_AFFILIATES: u64 = 10_000;

/// Listings are tagged with the affiliate's generation at load time. Every
/// invalidation bumps the generation, so a listing read before a write can
/// never outlive that write in the cache.
#[derive(Clone)]
pub struct EmployerCache {
    cache: Cache<i64, Arc<Vec<String>>>,
    generations: Arc<Mutex<HashMap<i64, u64>>>,
}

impl EmployerCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_AFFILIATES)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            generations: Arc::default(),
        }
    }

    fn generations(&self) -> MutexGuard<'_, HashMap<i64, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read before loading the listing from the database and handed back to
    /// [`EmployerCache::insert`].
    pub fn generation(&self, affiliate_id: i64) -> u64 {
        self.generations().get(&affiliate_id).copied().unwrap_or(0)
    }

    pub async fn get(&self, affiliate_id: i64) -> Option<Arc<Vec<String>>> {
        self.cache.get(&affiliate_id).await
    }

    /// Caches `employers` unless the affiliate was invalidated after
    /// `loaded_at` was read. The generation is checked again after the
    /// insert because an invalidation can land between check and insert.
    pub async fn insert(
        &self,
        affiliate_id: i64,
        loaded_at: u64,
        employers: Vec<String>,
    ) -> Arc<Vec<String>> {
        let employers = Arc::new(employers);
        if self.generation(affiliate_id) != loaded_at {
            debug!(affiliate_id, "employer listing went stale while loading; not caching");
            return employers;
        }
        self.cache.insert(affiliate_id, employers.clone()).await;
        if self.generation(affiliate_id) != loaded_at {
            self.cache.invalidate(&affiliate_id).await;
        }
        employers
    }

    /// Drops cached listings for every affiliate a document write touched.
    /// National documents (no affiliate) are never cached.
    pub async fn invalidate<I>(&self, affiliate_ids: I)
    where
        I: IntoIterator<Item = Option<i64>>,
    {
        for affiliate_id in affiliate_ids.into_iter().flatten() {
            debug!(affiliate_id, "invalidating employer cache");
            *self.generations().entry(affiliate_id).or_insert(0) += 1;
            self.cache.invalidate(&affiliate_id).await;
        }
    }
}
