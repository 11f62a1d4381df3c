//! The service layer tying the store, the cache and the background tasks
//! together. Handlers stay thin; every operation of the HTTP surface maps
//! to one method here.

pub mod title;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::analytics::aggregate::DAY_SECS;
use crate::analytics::{aggregate_visits, CodeStats, VisitRecord};
use crate::cache::MappingCache;
use crate::error::ServiceError;
use crate::models::{CreateUrlRequest, NewMapping, UrlMapping};
use crate::shortcode;
use crate::storage::{Storage, StorageError};

#[derive(Debug, Clone)]
pub struct ShortenerSettings {
    /// Retries when a generated code loses the uniqueness race.
    pub generate_attempts: u32,
    /// Whether to backfill missing titles from the destination page.
    pub title_backfill: bool,
    pub title_fetch_timeout: Duration,
    pub title_fetch_max_bytes: usize,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self {
            generate_attempts: 5,
            title_backfill: true,
            title_fetch_timeout: Duration::from_secs(4),
            title_fetch_max_bytes: 64 * 1024,
        }
    }
}

pub struct CreateOutcome {
    pub mapping: UrlMapping,
    /// False when an existing mapping was returned for an idempotent match.
    pub created: bool,
}

pub struct Shortener {
    storage: Arc<dyn Storage>,
    cache: Arc<MappingCache>,
    http: reqwest::Client,
    settings: ShortenerSettings,
}

impl Shortener {
    pub fn new(
        storage: Arc<dyn Storage>,
        cache: Arc<MappingCache>,
        settings: ShortenerSettings,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.title_fetch_timeout)
            .build()
            .context("failed to build HTTP client for title backfill")?;

        Ok(Self {
            storage,
            cache,
            http,
            settings,
        })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Shorten a URL, or return the owner's existing mapping for the same
    /// destination unchanged.
    pub async fn create(
        &self,
        request: CreateUrlRequest,
        owner_id: Option<&str>,
    ) -> Result<CreateOutcome, ServiceError> {
        let original_url = request.original_url.trim().to_string();
        let parsed = Url::parse(&original_url)
            .map_err(|_| ServiceError::InvalidUrl("not a valid absolute URL".to_string()))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ServiceError::InvalidUrl(
                "only http and https URLs can be shortened".to_string(),
            ));
        }

        let now = Self::now();

        if let Some(owner) = owner_id {
            if let Some(existing) = self
                .storage
                .find_by_original_url(&original_url, owner, now)
                .await?
            {
                return Ok(CreateOutcome {
                    mapping: existing,
                    created: false,
                });
            }
        }

        let custom_code = match request.custom_code.as_deref() {
            Some(code) => {
                shortcode::validate_custom_code(code).map_err(ServiceError::Validation)?;
                // Advisory pre-check; the store's uniqueness constraint is
                // authoritative if a racing create wins in between.
                if self.storage.find_by_code(code).await?.is_some() {
                    return Err(ServiceError::CodeConflict);
                }
                Some(code.to_string())
            }
            None => None,
        };

        let expires_at = match request.expires_in {
            Some(days) if days <= 0 => {
                return Err(ServiceError::Validation(
                    "expires_in must be a positive number of days".to_string(),
                ));
            }
            Some(days) => Some(now + days * DAY_SECS),
            None => None,
        };

        let mut attempts = 0;
        loop {
            let short_code = custom_code.clone().unwrap_or_else(shortcode::generate);
            let new_mapping = NewMapping {
                short_code: short_code.clone(),
                original_url: original_url.clone(),
                owner_id: owner_id.map(str::to_string),
                created_at: now,
                expires_at,
                title: request.title.clone(),
                description: request.description.clone(),
                tags: request.tags.clone(),
            };

            match self.storage.insert(&new_mapping).await {
                Ok(mapping) => {
                    // The code may have lived a previous life before an
                    // external hard deletion; drop any stale cache entries.
                    self.cache.invalidate(&short_code).await;

                    if mapping.title.is_none() && self.settings.title_backfill {
                        self.spawn_title_backfill(&mapping);
                    }

                    return Ok(CreateOutcome {
                        mapping,
                        created: true,
                    });
                }
                Err(StorageError::Conflict) => {
                    if custom_code.is_some() {
                        return Err(ServiceError::CodeConflict);
                    }
                    attempts += 1;
                    if attempts >= self.settings.generate_attempts {
                        tracing::warn!(
                            attempts,
                            "giving up on short code generation after repeated collisions"
                        );
                        return Err(ServiceError::CodeConflict);
                    }
                }
                Err(StorageError::Other(err)) => return Err(ServiceError::Internal(err)),
            }
        }
    }

    /// Resolve a short code for redirection, recording the visit.
    ///
    /// On a cache hit the redirect is served from memory and the click and
    /// visit update runs as a detached task off the critical path; failures
    /// there are logged and dropped. On a miss the update runs first and the
    /// cache is populated with the post-update record. Returns the mapping
    /// and whether it was served from cache.
    pub async fn resolve(
        &self,
        short_code: &str,
        visit: VisitRecord,
    ) -> Result<(UrlMapping, bool), ServiceError> {
        let now = Self::now();

        if let Some(cached) = self.cache.get_record(short_code).await {
            if cached.is_resolvable(now) {
                let storage = Arc::clone(&self.storage);
                let code = short_code.to_string();
                tokio::spawn(async move {
                    match storage.record_visit(&code, &visit, now).await {
                        Ok(Some(_)) => {}
                        Ok(None) => tracing::warn!(
                            short_code = %code,
                            "visit dropped, mapping no longer resolvable"
                        ),
                        Err(err) => tracing::warn!(
                            short_code = %code,
                            error = %err,
                            "failed to record visit for cached redirect"
                        ),
                    }
                });
                return Ok((cached, true));
            }

            // The mapping expired while cached; fall through to the store.
            self.cache.invalidate_record(short_code).await;
        }

        match self.storage.record_visit(short_code, &visit, now).await? {
            Some(updated) => {
                self.cache.set_record(short_code, updated.clone()).await;
                Ok((updated, false))
            }
            None => Err(ServiceError::NotFound),
        }
    }

    /// Aggregated analytics for a code, cached for the stats TTL.
    pub async fn stats(&self, short_code: &str) -> Result<CodeStats, ServiceError> {
        if let Some(cached) = self.cache.get_stats(short_code).await {
            return Ok(cached);
        }

        let now = Self::now();
        let mapping = self
            .storage
            .find_resolvable(short_code, now)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let visits = self.storage.visits_for_code(short_code).await?;
        let stats = aggregate_visits(&mapping, &visits, now);

        self.cache.set_stats(short_code, stats.clone()).await;

        Ok(stats)
    }

    /// Soft-delete a mapping. The record stays in storage but is never
    /// resolved, listed or counted again.
    pub async fn delete(
        &self,
        short_code: &str,
        owner_id: Option<&str>,
    ) -> Result<(), ServiceError> {
        let existing = self
            .storage
            .find_by_code(short_code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if existing.owner_id.is_some() && owner_id.is_none() {
            return Err(ServiceError::Unauthorized);
        }

        if !self.storage.soft_delete(short_code, owner_id).await? {
            // Wrong owner or already deleted; don't reveal which.
            return Err(ServiceError::NotFound);
        }

        self.cache.invalidate(short_code).await;

        Ok(())
    }

    /// List mappings newest-first, scoped to the requesting owner (or to
    /// anonymous mappings when no identity is present).
    pub async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UrlMapping>, ServiceError> {
        let limit = limit.clamp(1, 200);
        let offset = offset.max(0);

        Ok(self.storage.list(owner_id, limit, offset).await?)
    }

    fn spawn_title_backfill(&self, mapping: &UrlMapping) {
        let storage = Arc::clone(&self.storage);
        let cache = Arc::clone(&self.cache);
        let client = self.http.clone();
        let short_code = mapping.short_code.clone();
        let url = mapping.original_url.clone();
        let max_bytes = self.settings.title_fetch_max_bytes;

        tokio::spawn(async move {
            let Some(title) = title::fetch_title(&client, &url, max_bytes).await else {
                tracing::debug!(short_code = %short_code, "no title found for destination");
                return;
            };

            match storage.set_title(&short_code, &title).await {
                Ok(()) => cache.invalidate_record(&short_code).await,
                Err(err) => tracing::warn!(
                    short_code = %short_code,
                    error = %err,
                    "failed to store backfilled title"
                ),
            }
        });
    }
}
