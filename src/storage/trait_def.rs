use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::VisitRecord;
use crate::models::{NewMapping, UrlMapping};

/// Per-code visit log retention. Older entries are pruned once the log
/// grows past this, so the analytics data model stays bounded.
pub const VISIT_RETENTION_CAP: i64 = 10_000;

/// Pruning runs on every Nth visit rather than every visit.
pub const VISIT_PRUNE_EVERY: i64 = 1_000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes).
    async fn init(&self) -> Result<()>;

    /// Insert a new mapping. Fails with `Conflict` when the short code is
    /// already assigned, whether the holder is active or soft-deleted.
    async fn insert(&self, mapping: &NewMapping) -> StorageResult<UrlMapping>;

    /// Get a mapping by short code regardless of its lifecycle state.
    async fn find_by_code(&self, short_code: &str) -> Result<Option<UrlMapping>>;

    /// Get a mapping by short code, restricted to resolvable mappings
    /// (active and not past expiry as of `now`).
    async fn find_resolvable(&self, short_code: &str, now: i64) -> Result<Option<UrlMapping>>;

    /// Find a resolvable mapping with the same destination for this owner.
    /// Used for idempotent create; anonymous mappings are never matched.
    async fn find_by_original_url(
        &self,
        original_url: &str,
        owner_id: &str,
        now: i64,
    ) -> Result<Option<UrlMapping>>;

    /// List mappings newest-first. `owner_id` of `None` lists anonymous
    /// mappings only.
    async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UrlMapping>>;

    /// Atomically increment `clicks`, set `last_accessed` and append one
    /// visit record, restricted to resolvable mappings. Returns the
    /// post-update record, or `None` when no resolvable mapping matched.
    async fn record_visit(
        &self,
        short_code: &str,
        visit: &VisitRecord,
        now: i64,
    ) -> Result<Option<UrlMapping>>;

    /// Soft-delete a mapping. When the mapping has an owner, only that owner
    /// may delete it; anonymous mappings are deletable by anyone. Returns
    /// whether a row transitioned to inactive.
    async fn soft_delete(&self, short_code: &str, owner_id: Option<&str>) -> Result<bool>;

    /// Backfill the destination page title.
    async fn set_title(&self, short_code: &str, title: &str) -> Result<()>;

    /// All retained visits for a code, oldest first.
    async fn visits_for_code(&self, short_code: &str) -> Result<Vec<VisitRecord>>;
}
