//! Visit aggregation for the stats endpoint

use std::collections::HashMap;

use crate::analytics::models::{CodeStats, CountEntry, VisitRecord};
use crate::models::UrlMapping;

pub const DAY_SECS: i64 = 86_400;
pub const WEEK_SECS: i64 = 7 * DAY_SECS;

/// Label used for visits that carried no referrer.
const DIRECT_REFERRER: &str = "direct";

/// Aggregate the visit log of a mapping into summary counts.
///
/// Window counts use a strict lower bound: a visit at exactly `now - window`
/// is outside the window.
pub fn aggregate_visits(mapping: &UrlMapping, visits: &[VisitRecord], now: i64) -> CodeStats {
    let mut referrers: HashMap<&str, i64> = HashMap::new();
    let mut user_agents: HashMap<&str, i64> = HashMap::new();
    let mut last_day_clicks = 0;
    let mut last_week_clicks = 0;

    for visit in visits {
        *user_agents.entry(visit.user_agent.as_str()).or_insert(0) += 1;

        let referrer = visit.referrer.as_deref().unwrap_or(DIRECT_REFERRER);
        *referrers.entry(referrer).or_insert(0) += 1;

        if visit.visited_at > now - DAY_SECS {
            last_day_clicks += 1;
        }
        if visit.visited_at > now - WEEK_SECS {
            last_week_clicks += 1;
        }
    }

    CodeStats {
        short_code: mapping.short_code.clone(),
        original_url: mapping.original_url.clone(),
        total_clicks: mapping.clicks,
        last_accessed: mapping.last_accessed,
        created_at: mapping.created_at,
        expires_at: mapping.expires_at,
        last_day_clicks,
        last_week_clicks,
        referrers: sorted_descending(referrers),
        user_agents: sorted_descending(user_agents),
    }
}

fn sorted_descending(counts: HashMap<&str, i64>) -> Vec<CountEntry> {
    let mut entries: Vec<CountEntry> = counts
        .into_iter()
        .map(|(value, count)| CountEntry {
            value: value.to_string(),
            count,
        })
        .collect();

    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}
