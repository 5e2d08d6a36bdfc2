//! L3 Rate Limiter / Quota Keeper: per-minute sliding window plus per-month
//! quota, backed by a pluggable key-value store. Fails open on KV errors.

use crate::gateway::model::{Plan, PlanLimits};
use crate::logging::log_warn;
use async_trait::async_trait;
use chrono::{Datelike, TimeZone, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Minimal KV seam the limiter needs: atomic increment, read, and TTL.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError>;
    async fn get(&self, key: &str) -> Result<Option<i64>, KvError>;
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError>;
}

#[derive(Debug, thiserror::Error)]
#[error("kv backend error: {0}")]
pub struct KvError(pub String);

/// In-memory `KvStore`, used for tests and local runs without Redis.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    values: DashMap<String, (i64, std::time::Instant, Duration)>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let mut entry = self.values.entry(key.to_string()).or_insert((0, std::time::Instant::now(), ttl));
        if entry.1.elapsed() > entry.2 {
            entry.0 = 0;
            entry.1 = std::time::Instant::now();
            entry.2 = ttl;
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, KvError> {
        Ok(self.values.get(key).and_then(|entry| {
            if entry.1.elapsed() > entry.2 {
                None
            } else {
                Some(entry.0)
            }
        }))
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        if let Some(mut entry) = self.values.get_mut(key) {
            entry.2 = ttl;
        }
        Ok(())
    }
}

/// Redis-backed `KvStore`, grounded in `redis`'s `ConnectionManager` for
/// cheap cloning across concurrent request handlers.
pub struct RedisKvStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| KvError(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let count: i64 = conn.incr(key, 1).await.map_err(|e| KvError(e.to_string()))?;
        if count == 1 {
            let _: () = conn
                .expire(key, ttl.as_secs() as i64)
                .await
                .map_err(|e| KvError(e.to_string()))?;
        }
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, KvError> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(|e| KvError(e.to_string()))
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        use redis::AsyncCommands;
        let mut conn = self.manager.clone();
        let _: () = conn
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| KvError(e.to_string()))?;
        Ok(())
    }
}

/// Outcome of a rate/quota admission check, carrying the headers the route
/// layer must attach regardless of pass/fail.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub retry_after_secs: u64,
}

const MINUTE: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Minute-window admission check. Fails open (admits, logs a warning) if
    /// the KV backend errors.
    pub async fn check_minute_window(&self, project_id: &str, plan: Plan) -> RateLimitDecision {
        let PlanLimits {
            requests_per_minute,
            ..
        } = plan.limits();
        let now = Utc::now().timestamp();
        let bucket = now / 60;
        let key = format!("ratelimit:{project_id}:{bucket}");
        let reset_at = (bucket + 1) * 60;

        match self.kv.incr(&key, MINUTE).await {
            Ok(count) => {
                let count = count.max(0) as u32;
                let remaining = requests_per_minute.saturating_sub(count);
                RateLimitDecision {
                    allowed: count <= requests_per_minute,
                    limit: requests_per_minute,
                    remaining,
                    reset_at,
                    retry_after_secs: (reset_at - now).max(0) as u64,
                }
            }
            Err(e) => {
                log_warn!(
                    project_id = %project_id,
                    error = %e,
                    "rate limiter KV backend unreachable, admitting request"
                );
                RateLimitDecision {
                    allowed: true,
                    limit: requests_per_minute,
                    remaining: requests_per_minute,
                    reset_at,
                    retry_after_secs: 0,
                }
            }
        }
    }

    fn quota_key(project_id: &str) -> String {
        let now = Utc::now();
        format!("quota:{project_id}:{:04}-{:02}", now.year(), now.month())
    }

    /// Monthly quota check: a read-only GET at admission time. Fails open.
    pub async fn check_monthly_quota(&self, project_id: &str, plan: Plan) -> RateLimitDecision {
        let PlanLimits {
            requests_per_month, ..
        } = plan.limits();
        let key = Self::quota_key(project_id);
        let reset_at = next_month_boundary();

        match self.kv.get(&key).await {
            Ok(count) => {
                let count = count.unwrap_or(0).max(0) as u64;
                RateLimitDecision {
                    allowed: count < requests_per_month,
                    limit: requests_per_month.min(u32::MAX as u64) as u32,
                    remaining: requests_per_month.saturating_sub(count).min(u32::MAX as u64) as u32,
                    reset_at,
                    retry_after_secs: (reset_at - Utc::now().timestamp()).max(0) as u64,
                }
            }
            Err(e) => {
                log_warn!(
                    project_id = %project_id,
                    error = %e,
                    "quota KV backend unreachable, admitting request"
                );
                RateLimitDecision {
                    allowed: true,
                    limit: requests_per_month.min(u32::MAX as u64) as u32,
                    remaining: requests_per_month.min(u32::MAX as u64) as u32,
                    reset_at,
                    retry_after_secs: 0,
                }
            }
        }
    }

    /// Increments the monthly quota counter. Called only after a successful
    /// (or cached) response, never at admission.
    pub async fn record_usage(&self, project_id: &str) {
        let key = Self::quota_key(project_id);
        // TTL extended to end-of-next-month for safety against clock skew.
        let ttl = Duration::from_secs(62 * 24 * 60 * 60);
        if let Err(e) = self.kv.incr(&key, ttl).await {
            log_warn!(
                project_id = %project_id,
                error = %e,
                "failed to record monthly quota usage, continuing"
            );
        }
    }
}

fn next_month_boundary() -> i64 {
    let now = Utc::now();
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    chrono::Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(now.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn minute_window_admits_up_to_the_limit() {
        let kv = Arc::new(InMemoryKvStore::new());
        let limiter = RateLimiter::new(kv);
        for _ in 0..10 {
            let decision = limiter.check_minute_window("proj_free", Plan::Free).await;
            assert!(decision.allowed);
        }
        let eleventh = limiter.check_minute_window("proj_free", Plan::Free).await;
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.remaining, 0);
    }

    #[tokio::test]
    async fn fails_open_when_kv_errors() {
        struct AlwaysErrors;
        #[async_trait]
        impl KvStore for AlwaysErrors {
            async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64, KvError> {
                Err(KvError("connection refused".to_string()))
            }
            async fn get(&self, _key: &str) -> Result<Option<i64>, KvError> {
                Err(KvError("connection refused".to_string()))
            }
            async fn set_ttl(&self, _key: &str, _ttl: Duration) -> Result<(), KvError> {
                Err(KvError("connection refused".to_string()))
            }
        }
        let limiter = RateLimiter::new(Arc::new(AlwaysErrors));
        let decision = limiter.check_minute_window("proj_x", Plan::Free).await;
        assert!(decision.allowed);
    }
}
