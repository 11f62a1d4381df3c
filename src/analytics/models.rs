//! Data models for per-visit analytics

use serde::{Deserialize, Serialize};

/// A single recorded visit, appended on every successful resolution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VisitRecord {
    /// Unix timestamp of the visit
    pub visited_at: i64,

    /// Client IP as reported by the connection or a forwarding proxy
    pub ip: String,

    /// Raw User-Agent header, "unknown" when absent
    pub user_agent: String,

    /// Referrer URL, when the client sent one
    pub referrer: Option<String>,
}

/// One value/count pair in a grouped breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub value: String,
    pub count: i64,
}

/// Aggregated analytics for a short code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeStats {
    pub short_code: String,
    pub original_url: String,

    /// Authoritative click counter from the mapping record
    pub total_clicks: i64,
    pub last_accessed: Option<i64>,
    pub created_at: i64,
    pub expires_at: Option<i64>,

    /// Visits strictly newer than 24 hours before the request
    pub last_day_clicks: i64,
    /// Visits strictly newer than 7 days before the request
    pub last_week_clicks: i64,

    /// Visit counts grouped by referrer, descending
    pub referrers: Vec<CountEntry>,
    /// Visit counts grouped by user agent, descending
    pub user_agents: Vec<CountEntry>,
}
