//! Row types shared by the SQL backends.

use sqlx::FromRow;

use crate::models::UrlMapping;

/// `mappings` table row. Tags are stored as a JSON array in a text column;
/// a row that fails to parse is treated as having no tags.
#[derive(Debug, FromRow)]
pub(crate) struct MappingRow {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub clicks: i64,
    pub last_accessed: Option<i64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub is_active: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

impl From<MappingRow> for UrlMapping {
    fn from(row: MappingRow) -> Self {
        let tags = row
            .tags
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        UrlMapping {
            id: row.id,
            short_code: row.short_code,
            original_url: row.original_url,
            owner_id: row.owner_id,
            clicks: row.clicks,
            last_accessed: row.last_accessed,
            created_at: row.created_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            title: row.title,
            description: row.description,
            tags,
        }
    }
}

pub(crate) fn tags_to_json(tags: Option<&[String]>) -> Option<String> {
    tags.map(|tags| serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string()))
}
