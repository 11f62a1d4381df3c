use serde::{Deserialize, Serialize};

/// A short-code to destination-URL mapping with its counters and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlMapping {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub clicks: i64,
    /// Unix timestamp of the most recent successful resolution.
    pub last_accessed: Option<i64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub is_active: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UrlMapping {
    /// A mapping is resolvable iff it is active and not past its expiry.
    pub fn is_resolvable(&self, now: i64) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Fields of a mapping that the caller supplies at creation time.
#[derive(Debug, Clone)]
pub struct NewMapping {
    pub short_code: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUrlRequest {
    pub original_url: String,
    pub custom_code: Option<String>,
    /// Days from now until the mapping expires.
    pub expires_in: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}
