// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::config::RateLimitConfig;

/// Request classes counted separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodClass {
    Read,
    Write,
    Delete,
}

impl MethodClass {
    #[must_use]
    pub fn of(method: &str) -> Self {
        match method {
            "POST" | "PUT" | "PATCH" => Self::Write,
            "DELETE" => Self::Delete,
            _ => Self::Read,
        }
    }

    #[must_use]
    pub fn limit(self, cfg: &RateLimitConfig) -> u32 {
        match self {
            Self::Read => cfg.read_per_window,
            Self::Write => cfg.write_per_window,
            Self::Delete => cfg.delete_per_window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix second at which the current window ends.
    pub reset_at: i64,
}

impl Decision {
    #[must_use]
    pub fn retry_after_secs(&self, now: i64) -> u64 {
        u64::try_from((self.reset_at - now).max(1)).unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: i64,
    count: u32,
}

const PRUNE_THRESHOLD: usize = 50_000;

/// Fixed-window counters keyed by user and method class. Process-local.
#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(i64, MethodClass), Window>>,
}

impl RateLimiter {
    pub async fn check(
        &self,
        user_id: i64,
        class: MethodClass,
        cfg: &RateLimitConfig,
        now: i64,
    ) -> Decision {
        let window_secs = i64::try_from(cfg.window.as_secs().max(1)).unwrap_or(i64::MAX);
        let limit = class.limit(cfg);
        let mut windows = self.windows.lock().await;
        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now - w.started_at < window_secs);
        }
        let window = windows.entry((user_id, class)).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now - window.started_at >= window_secs {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }
        let reset_at = window.started_at + window_secs;
        if window.count >= limit {
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
            };
        }
        window.count += 1;
        Decision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg() -> RateLimitConfig {
        RateLimitConfig {
            read_per_window: 3,
            write_per_window: 2,
            delete_per_window: 1,
            window: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn window_exhausts_then_resets() {
        let limiter = RateLimiter::default();
        let cfg = cfg();
        for expected in [2, 1, 0] {
            let d = limiter.check(1, MethodClass::Read, &cfg, 100).await;
            assert!(d.allowed);
            assert_eq!(d.remaining, expected);
        }
        let denied = limiter.check(1, MethodClass::Read, &cfg, 130).await;
        assert!(!denied.allowed);
        assert_eq!(denied.reset_at, 160);
        assert_eq!(denied.retry_after_secs(130), 30);

        let fresh = limiter.check(1, MethodClass::Read, &cfg, 160).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
    }

    #[tokio::test]
    async fn classes_and_users_are_independent() {
        let limiter = RateLimiter::default();
        let cfg = cfg();
        assert!(limiter.check(1, MethodClass::Delete, &cfg, 0).await.allowed);
        assert!(!limiter.check(1, MethodClass::Delete, &cfg, 1).await.allowed);
        assert!(limiter.check(1, MethodClass::Write, &cfg, 1).await.allowed);
        assert!(limiter.check(2, MethodClass::Delete, &cfg, 1).await.allowed);
    }

    #[test]
    fn methods_map_to_classes() {
        assert_eq!(MethodClass::of("GET"), MethodClass::Read);
        assert_eq!(MethodClass::of("PATCH"), MethodClass::Write);
        assert_eq!(MethodClass::of("DELETE"), MethodClass::Delete);
    }
}
