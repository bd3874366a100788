//! Per-client request ceilings.

use std::collections::HashMap;
use std::sync::Mutex;

/// Windows a count is kept for before it is dropped.
const RETAINED_WINDOWS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimit {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }
}

/// Manual refresh endpoint.
pub const FETCH_LIMIT: RateLimit = RateLimit::new(5, 60);
/// Contacts listing and vCard downloads.
pub const PAGE_LIMIT: RateLimit = RateLimit::new(30, 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

pub trait RateLimiter: Send + Sync {
    /// Count one request for `identifier` and report whether it fits `limit`.
    fn check(&self, identifier: &str, limit: RateLimit) -> RateDecision;
}

/// Requests seen in one window and the time after which the entry is stale.
#[derive(Debug, Clone, Copy)]
struct WindowCount {
    count: u32,
    stale_at: u64,
}

/// In-process counter keyed by identifier and fixed window start.
#[derive(Default)]
pub struct FixedWindowLimiter {
    counts: Mutex<HashMap<(String, u64), WindowCount>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_at(&self, identifier: &str, limit: RateLimit, now_secs: u64) -> RateDecision {
        let window_secs = limit.window_secs.max(1);
        let window_start = now_secs - now_secs % window_secs;

        let mut counts = self.counts.lock().unwrap_or_else(|p| p.into_inner());
        counts.retain(|_, entry| entry.stale_at > now_secs);

        let entry = counts
            .entry((identifier.to_string(), window_start))
            .or_insert(WindowCount {
                count: 0,
                stale_at: window_start.saturating_add(window_secs.saturating_mul(RETAINED_WINDOWS)),
            });
        entry.count = entry.count.saturating_add(1);
        let count = entry.count;

        if count <= limit.max_requests {
            RateDecision::Allowed
        } else {
            tracing::warn!(identifier, count, "rate limit exceeded");
            RateDecision::Limited {
                retry_after_secs: window_secs,
            }
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, identifier: &str, limit: RateLimit) -> RateDecision {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.check_at(identifier, limit, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = FixedWindowLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check_at("fetch_1.2.3.4", FETCH_LIMIT, 120).is_allowed());
        }
        assert_eq!(
            limiter.check_at("fetch_1.2.3.4", FETCH_LIMIT, 121),
            RateDecision::Limited { retry_after_secs: 60 }
        );
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = FixedWindowLimiter::new();
        let limit = RateLimit::new(1, 60);
        assert!(limiter.check_at("a", limit, 0).is_allowed());
        assert!(limiter.check_at("b", limit, 0).is_allowed());
        assert!(!limiter.check_at("a", limit, 1).is_allowed());
    }

    #[test]
    fn test_new_window_resets() {
        let limiter = FixedWindowLimiter::new();
        let limit = RateLimit::new(1, 60);
        assert!(limiter.check_at("a", limit, 59).is_allowed());
        assert!(!limiter.check_at("a", limit, 59).is_allowed());
        assert!(limiter.check_at("a", limit, 60).is_allowed());
    }

    #[test]
    fn test_old_windows_pruned() {
        let limiter = FixedWindowLimiter::new();
        let limit = RateLimit::new(10, 60);
        for minute in 0..10 {
            limiter.check_at("a", limit, minute * 60);
        }
        let kept = limiter.counts.lock().unwrap().len();
        assert_eq!(kept, RETAINED_WINDOWS as usize);
    }

    #[test]
    fn test_one_shot_clients_do_not_accumulate() {
        let limiter = FixedWindowLimiter::new();
        for i in 0..10_000u64 {
            limiter.check_at(&format!("client_{}", i), FETCH_LIMIT, i * 60);
        }
        let kept = limiter.counts.lock().unwrap().len();
        assert!(kept <= RETAINED_WINDOWS as usize, "kept {}", kept);
    }

    #[test]
    fn test_idle_client_is_pruned_by_other_traffic() {
        let limiter = FixedWindowLimiter::new();
        let limit = RateLimit::new(1, 60);
        assert!(limiter.check_at("idle", limit, 0).is_allowed());
        limiter.check_at("busy", limit, 60 * RETAINED_WINDOWS);

        let counts = limiter.counts.lock().unwrap();
        assert!(counts.keys().all(|(id, _)| id != "idle"));
    }

    #[test]
    fn test_trait_object() {
        let limiter: Box<dyn RateLimiter> = Box::new(FixedWindowLimiter::new());
        assert!(limiter.check("x", PAGE_LIMIT).is_allowed());
    }
}
