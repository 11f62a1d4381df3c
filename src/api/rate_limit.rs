//! Fixed-window request limiter for the create endpoint.

use dashmap::DashMap;
use std::net::IpAddr;

struct Window {
    started_at: i64,
    count: u32,
}

/// Per-client-IP fixed-window counter. Windows reset wholesale once their
/// span has elapsed; there is no smoothing across the boundary.
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    max_requests: u32,
    window_secs: i64,
}

/// Stale window entries are swept once the map grows past this.
const SWEEP_THRESHOLD: usize = 10_000;

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: i64) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window_secs,
        }
    }

    /// Count one request from `ip`; returns false when the window budget is
    /// exhausted.
    pub fn check(&self, ip: IpAddr, now: i64) -> bool {
        if self.windows.len() > SWEEP_THRESHOLD {
            let window_secs = self.window_secs;
            self.windows
                .retain(|_, window| now - window.started_at < window_secs);
        }

        let mut entry = self.windows.entry(ip).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if now - entry.started_at >= self.window_secs {
            entry.started_at = now;
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }
}
