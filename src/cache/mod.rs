//! In-process TTL cache for the hot redirect path.
//!
//! Two independently keyed caches share the same TTL: the base mapping
//! record used by redirects, and the aggregated stats used by the stats
//! endpoint. Expiry is enforced by moka at read time; the background sweep
//! only reclaims memory for entries nothing reads again.
//!
//! Cached records are as of the last resolution, not click-accurate: counts
//! read through the cache may lag the store by one redirect generation.

use moka::future::Cache;
use std::time::Duration;

use crate::analytics::CodeStats;
use crate::models::UrlMapping;

pub struct MappingCache {
    records: Cache<String, UrlMapping>,
    stats: Cache<String, CodeStats>,
}

impl MappingCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            records: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            stats: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Spawn the coarse background sweep reclaiming expired entries.
    pub fn start_sweep(&self, interval: Duration) {
        let records = self.records.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                records.run_pending_tasks().await;
                stats.run_pending_tasks().await;
            }
        });
    }

    pub async fn get_record(&self, short_code: &str) -> Option<UrlMapping> {
        self.records.get(short_code).await
    }

    pub async fn set_record(&self, short_code: &str, mapping: UrlMapping) {
        self.records.insert(short_code.to_string(), mapping).await;
    }

    pub async fn invalidate_record(&self, short_code: &str) {
        self.records.invalidate(short_code).await;
    }

    pub async fn get_stats(&self, short_code: &str) -> Option<CodeStats> {
        self.stats.get(short_code).await
    }

    pub async fn set_stats(&self, short_code: &str, stats: CodeStats) {
        self.stats.insert(short_code.to_string(), stats).await;
    }

    pub async fn invalidate_stats(&self, short_code: &str) {
        self.stats.invalidate(short_code).await;
    }

    /// Drop both entries for a code. Used on delete, where the record and
    /// the stats aggregate must disappear together.
    pub async fn invalidate(&self, short_code: &str) {
        self.invalidate_record(short_code).await;
        self.invalidate_stats(short_code).await;
    }
}
