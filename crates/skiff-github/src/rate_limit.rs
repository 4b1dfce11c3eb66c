//! Rate-limit observation and bounded history.
//!
//! GitHub reports rate-limit state in `X-RateLimit-*` response headers. Every
//! successful request records a snapshot; a bounded, instance-owned history
//! keeps the most recent observations for backoff math and the end-of-run
//! summary.

use std::collections::VecDeque;

use chrono::{Local, TimeZone, Utc};
use reqwest::header::HeaderMap;

/// One observation of the upstream rate limit.
#[derive(Debug, Clone)]
pub struct RateLimitSnapshot {
    /// Which rate-limited resource the headers describe (e.g. `graphql`).
    pub resource: String,
    /// Total requests allowed in the window.
    pub limit: u32,
    /// Requests left in the window.
    pub remaining: u32,
    /// Epoch second at which the window resets.
    pub reset_epoch: i64,
    /// `reset_epoch` as a local wall-clock time, for log messages.
    pub reset_when: String,
    /// Local wall-clock time of the observation.
    pub observed_at: String,
}

impl RateLimitSnapshot {
    /// Build a snapshot from response headers.
    ///
    /// Returns `None` when the `X-RateLimit-Reset` header is absent or
    /// unreadable, which happens on some error responses.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let number = |name: &str| get(name).and_then(|v| v.parse::<u32>().ok());

        let reset_epoch = get("x-ratelimit-reset")?.parse::<i64>().ok()?;
        Some(Self {
            resource: get("x-ratelimit-resource").unwrap_or_else(|| "graphql".into()),
            limit: number("x-ratelimit-limit").unwrap_or(0),
            remaining: number("x-ratelimit-remaining").unwrap_or(0),
            reset_epoch,
            reset_when: format_local(reset_epoch),
            observed_at: Local::now().format("%H:%M:%S").to_string(),
        })
    }

    /// Seconds until the window resets, measured from now. Negative when the
    /// reported reset is already in the past.
    #[must_use]
    pub fn seconds_until_reset(&self) -> i64 {
        self.reset_epoch - Utc::now().timestamp()
    }
}

fn format_local(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map_or_else(|| epoch.to_string(), |t| t.format("%H:%M:%S").to_string())
}

/// Bounded, append-only history of rate-limit snapshots. Oldest observations
/// are evicted first.
#[derive(Debug)]
pub struct RateLimitHistory {
    capacity: usize,
    entries: VecDeque<RateLimitSnapshot>,
}

impl RateLimitHistory {
    /// Create a history that retains at most `capacity` snapshots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a snapshot, evicting the oldest if the history is full.
    pub fn record(&mut self, snapshot: RateLimitSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// The most recent snapshot, if any request has completed yet.
    #[must_use]
    pub fn last(&self) -> Option<&RateLimitSnapshot> {
        self.entries.back()
    }

    /// Number of retained snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no snapshot has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                reqwest::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn parses_full_header_set() {
        let map = headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4321"),
            ("x-ratelimit-reset", "1700000000"),
            ("x-ratelimit-resource", "graphql"),
        ]);
        let snap = RateLimitSnapshot::from_headers(&map).unwrap();
        assert_eq!(snap.limit, 5000);
        assert_eq!(snap.remaining, 4321);
        assert_eq!(snap.reset_epoch, 1_700_000_000);
        assert_eq!(snap.resource, "graphql");
        assert!(!snap.reset_when.is_empty());
    }

    #[test]
    fn missing_reset_is_none() {
        let map = headers(&[("x-ratelimit-limit", "5000")]);
        assert!(RateLimitSnapshot::from_headers(&map).is_none());
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = RateLimitHistory::new(3);
        for remaining in 0..5u32 {
            history.record(RateLimitSnapshot {
                resource: "graphql".into(),
                limit: 5000,
                remaining,
                reset_epoch: 0,
                reset_when: String::new(),
                observed_at: String::new(),
            });
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().remaining, 4);
    }

    #[test]
    fn empty_history_has_no_last() {
        let history = RateLimitHistory::new(50);
        assert!(history.is_empty());
        assert!(history.last().is_none());
    }
}
