use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use super::rows::{tags_to_json, MappingRow};
use crate::analytics::VisitRecord;
use crate::models::{NewMapping, UrlMapping};
use crate::storage::{
    Storage, StorageError, StorageResult, VISIT_PRUNE_EVERY, VISIT_RETENTION_CAP,
};

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mappings (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                owner_id TEXT,
                clicks BIGINT NOT NULL DEFAULT 0,
                last_accessed BIGINT,
                created_at BIGINT NOT NULL,
                expires_at BIGINT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                title TEXT,
                description TEXT,
                tags TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_owner ON mappings(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_active ON mappings(is_active)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_mappings_expires ON mappings(expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL,
                visited_at BIGINT NOT NULL,
                ip TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                referrer TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visits_code_time ON visits(short_code, visited_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert(&self, mapping: &NewMapping) -> StorageResult<UrlMapping> {
        let result = sqlx::query(
            r#"
            INSERT INTO mappings
                (short_code, original_url, owner_id, created_at, expires_at,
                 is_active, title, description, tags)
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7, $8)
            ON CONFLICT (short_code) DO NOTHING
            "#,
        )
        .bind(&mapping.short_code)
        .bind(&mapping.original_url)
        .bind(&mapping.owner_id)
        .bind(mapping.created_at)
        .bind(mapping.expires_at)
        .bind(&mapping.title)
        .bind(&mapping.description)
        .bind(tags_to_json(mapping.tags.as_deref()))
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                   created_at, expires_at, is_active, title, description, tags
            FROM mappings
            WHERE short_code = $1
            "#,
        )
        .bind(&mapping.short_code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(row.into())
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<UrlMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                   created_at, expires_at, is_active, title, description, tags
            FROM mappings
            WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_resolvable(&self, short_code: &str, now: i64) -> Result<Option<UrlMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                   created_at, expires_at, is_active, title, description, tags
            FROM mappings
            WHERE short_code = $1 AND is_active
              AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(short_code)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_original_url(
        &self,
        original_url: &str,
        owner_id: &str,
        now: i64,
    ) -> Result<Option<UrlMapping>> {
        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                   created_at, expires_at, is_active, title, description, tags
            FROM mappings
            WHERE original_url = $1 AND owner_id = $2 AND is_active
              AND (expires_at IS NULL OR expires_at > $3)
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(original_url)
        .bind(owner_id)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list(
        &self,
        owner_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UrlMapping>> {
        let rows = match owner_id {
            Some(owner) => {
                sqlx::query_as::<_, MappingRow>(
                    r#"
                    SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                           created_at, expires_at, is_active, title, description, tags
                    FROM mappings
                    WHERE owner_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(owner)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, MappingRow>(
                    r#"
                    SELECT id, short_code, original_url, owner_id, clicks, last_accessed,
                           created_at, expires_at, is_active, title, description, tags
                    FROM mappings
                    WHERE owner_id IS NULL
                    ORDER BY created_at DESC, id DESC
                    LIMIT $1 OFFSET $2
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_visit(
        &self,
        short_code: &str,
        visit: &VisitRecord,
        now: i64,
    ) -> Result<Option<UrlMapping>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MappingRow>(
            r#"
            UPDATE mappings
            SET clicks = clicks + 1, last_accessed = $1
            WHERE short_code = $2 AND is_active
              AND (expires_at IS NULL OR expires_at > $1)
            RETURNING id, short_code, original_url, owner_id, clicks, last_accessed,
                      created_at, expires_at, is_active, title, description, tags
            "#,
        )
        .bind(now)
        .bind(short_code)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO visits (short_code, visited_at, ip, user_agent, referrer)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(short_code)
        .bind(visit.visited_at)
        .bind(&visit.ip)
        .bind(&visit.user_agent)
        .bind(&visit.referrer)
        .execute(&mut *tx)
        .await?;

        if row.clicks % VISIT_PRUNE_EVERY == 0 {
            sqlx::query(
                r#"
                DELETE FROM visits
                WHERE short_code = $1 AND id NOT IN (
                    SELECT id FROM visits
                    WHERE short_code = $1
                    ORDER BY id DESC
                    LIMIT $2
                )
                "#,
            )
            .bind(short_code)
            .bind(VISIT_RETENTION_CAP)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(row.into()))
    }

    async fn soft_delete(&self, short_code: &str, owner_id: Option<&str>) -> Result<bool> {
        let result = match owner_id {
            Some(owner) => {
                sqlx::query(
                    r#"
                    UPDATE mappings
                    SET is_active = FALSE
                    WHERE short_code = $1 AND is_active
                      AND (owner_id IS NULL OR owner_id = $2)
                    "#,
                )
                .bind(short_code)
                .bind(owner)
                .execute(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE mappings
                    SET is_active = FALSE
                    WHERE short_code = $1 AND is_active AND owner_id IS NULL
                    "#,
                )
                .bind(short_code)
                .execute(self.pool.as_ref())
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn set_title(&self, short_code: &str, title: &str) -> Result<()> {
        sqlx::query("UPDATE mappings SET title = $1 WHERE short_code = $2")
            .bind(title)
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn visits_for_code(&self, short_code: &str) -> Result<Vec<VisitRecord>> {
        let visits = sqlx::query_as::<_, VisitRecord>(
            r#"
            SELECT visited_at, ip, user_agent, referrer
            FROM visits
            WHERE short_code = $1
            ORDER BY visited_at ASC, id ASC
            "#,
        )
        .bind(short_code)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visits)
    }
}
