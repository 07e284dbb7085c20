//! Limiting strategies and the sliding-window implementation.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

use super::{RATE_LIMITING_EXPIRES_AT, RATE_LIMITING_STATE, RATE_LIMITING_TOTAL_REQUESTS};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SlidegateError};
use crate::store::WindowStore;

/// Name of the sliding-window strategy in configuration.
pub const SLIDING_WINDOW: &str = "sliding_window";

/// Number of lock shards used when none is configured.
const DEFAULT_LOCK_SHARDS: usize = 64;

/// Outcome of a strategy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The event fits within the quota.
    Allow,
    /// The quota is exhausted for the current window.
    Deny,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Allow => write!(f, "Allow"),
            State::Deny => write!(f, "Deny"),
        }
    }
}

/// Fully resolved input for one strategy invocation.
#[derive(Debug, Clone)]
pub struct LimitRequest {
    /// The subject's rate-limiting key.
    pub key: String,
    /// Maximum admitted events per window.
    pub limit: u64,
    /// Sliding window length.
    pub window: Duration,
}

/// Result of one strategy invocation.
#[derive(Debug, Clone)]
pub struct LimitResult {
    /// The Allow/Deny decision.
    pub state: State,
    /// Window occupancy at evaluation time, including the current event.
    pub total_requests: u64,
    /// Advisory hint for when the current window conceptually resets
    /// (`now + window`). This is NOT the instant occupancy next decreases;
    /// that depends on the age of the oldest surviving event.
    pub expires_at: DateTime<Utc>,
}

impl LimitResult {
    /// The three response metadata pairs, attached on Allow and Deny alike.
    pub fn metadata(&self) -> [(&'static str, String); 3] {
        [
            (RATE_LIMITING_TOTAL_REQUESTS, self.total_requests.to_string()),
            (RATE_LIMITING_STATE, self.state.to_string()),
            (RATE_LIMITING_EXPIRES_AT, self.expires_at.to_rfc3339()),
        ]
    }
}

/// A rate-limiting algorithm.
///
/// Strategies decide Allow/Deny for one (key, limit, window) triple and
/// report window occupancy. Additional algorithms plug in behind this
/// trait and the name registry in [`strategy_from_name`].
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Evaluate one event against the quota.
    async fn run(&self, request: &LimitRequest) -> Result<LimitResult>;
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Strategy")
    }
}

/// Resolve a strategy by its configured name.
pub fn strategy_from_name(
    name: &str,
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    lock_shards: usize,
) -> Result<Box<dyn Strategy>> {
    match name {
        SLIDING_WINDOW => Ok(Box::new(SlidingWindow::with_clock(store, clock, lock_shards))),
        other => Err(SlidegateError::UnknownStrategy(other.to_string())),
    }
}

/// Bounded per-key lock table.
///
/// Keys hash onto a fixed set of mutex shards, so memory stays constant
/// regardless of key cardinality. Two keys on the same shard serialize
/// against each other; unrelated shards proceed concurrently.
struct LockTable {
    shards: Vec<Mutex<()>>,
}

impl LockTable {
    fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        self.shards[index].lock().await
    }
}

/// True sliding-window strategy over an external ordered-set store.
///
/// Per evaluation it prunes entries older than `now - window`, records the
/// current event under a fresh UUID, and counts the survivors in one
/// batched store round trip. The event is recorded even when the decision
/// is Deny, so rejected traffic keeps occupying the window until it ages
/// out.
pub struct SlidingWindow {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    locks: LockTable,
}

impl SlidingWindow {
    /// Create a sliding window over the given store with wall-clock time.
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), DEFAULT_LOCK_SHARDS)
    }

    /// Create a sliding window with an explicit clock and lock-table size.
    pub fn with_clock(
        store: Arc<dyn WindowStore>,
        clock: Arc<dyn Clock>,
        lock_shards: usize,
    ) -> Self {
        Self {
            store,
            clock,
            locks: LockTable::new(lock_shards),
        }
    }
}

#[async_trait]
impl Strategy for SlidingWindow {
    async fn run(&self, request: &LimitRequest) -> Result<LimitResult> {
        // Serialize the prune+record+count sequence per key. The guard is
        // held only for this one evaluation.
        let _guard = self.locks.lock(&request.key).await;

        let now = self.clock.now();
        let cutoff = (now - request.window).timestamp_nanos_opt().unwrap_or(0);
        let now_nanos = now.timestamp_nanos_opt().unwrap_or(i64::MAX);

        // A fresh UUID per event keeps members unique even when two events
        // land on the same nanosecond.
        let member = Uuid::new_v4().to_string();

        let total_requests = self
            .store
            .prune_record_count(&request.key, cutoff, now_nanos, &member)
            .await?;

        let state = if total_requests > request.limit {
            debug!(
                key = %request.key,
                total_requests,
                limit = request.limit,
                "Rate limit exceeded"
            );
            State::Deny
        } else {
            State::Allow
        };

        trace!(
            key = %request.key,
            total_requests,
            state = %state,
            "Sliding window evaluated"
        );

        Ok(LimitResult {
            state,
            total_requests,
            expires_at: now + request.window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn window(clock: Arc<ManualClock>) -> SlidingWindow {
        SlidingWindow::with_clock(Arc::new(MemoryStore::new()), clock, 8)
    }

    fn manual_clock() -> Arc<ManualClock> {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Arc::new(ManualClock::new(start))
    }

    fn limit_request(key: &str) -> LimitRequest {
        LimitRequest {
            key: key.to_string(),
            limit: 3,
            window: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_allows_until_limit_then_denies() {
        let clock = manual_clock();
        let strategy = window(clock.clone());
        let request = limit_request("u1");

        for expected in 1..=3 {
            clock.advance(Duration::from_millis(200));
            let result = strategy.run(&request).await.unwrap();
            assert_eq!(result.state, State::Allow);
            assert_eq!(result.total_requests, expected);
        }

        clock.advance(Duration::from_millis(200));
        let denied = strategy.run(&request).await.unwrap();
        assert_eq!(denied.state, State::Deny);
        assert_eq!(denied.total_requests, 4);
    }

    #[tokio::test]
    async fn test_exactly_limit_still_allows() {
        let clock = manual_clock();
        let strategy = window(clock);
        let request = LimitRequest {
            key: "u1".to_string(),
            limit: 1,
            window: Duration::from_secs(10),
        };

        let result = strategy.run(&request).await.unwrap();
        assert_eq!(result.state, State::Allow);
        assert_eq!(result.total_requests, 1);
    }

    #[tokio::test]
    async fn test_window_expiry_resets_occupancy() {
        let clock = manual_clock();
        let strategy = window(clock.clone());
        let request = limit_request("u1");

        for _ in 0..4 {
            strategy.run(&request).await.unwrap();
        }

        clock.advance(Duration::from_secs(11));
        let result = strategy.run(&request).await.unwrap();
        assert_eq!(result.state, State::Allow);
        assert_eq!(result.total_requests, 1);
    }

    #[tokio::test]
    async fn test_denied_events_still_occupy_the_window() {
        let clock = manual_clock();
        let strategy = window(clock);
        let request = limit_request("u1");

        for _ in 0..4 {
            strategy.run(&request).await.unwrap();
        }

        // The denied fourth event was recorded too.
        let result = strategy.run(&request).await.unwrap();
        assert_eq!(result.state, State::Deny);
        assert_eq!(result.total_requests, 5);
    }

    #[tokio::test]
    async fn test_keys_do_not_interfere() {
        let clock = manual_clock();
        let strategy = window(clock);

        for _ in 0..4 {
            strategy.run(&limit_request("u1")).await.unwrap();
        }

        let other = strategy.run(&limit_request("u2")).await.unwrap();
        assert_eq!(other.state, State::Allow);
        assert_eq!(other.total_requests, 1);
    }

    #[tokio::test]
    async fn test_expires_at_is_now_plus_window() {
        let clock = manual_clock();
        let now = clock.now();
        let strategy = window(clock);

        let result = strategy.run(&limit_request("u1")).await.unwrap();
        assert_eq!(result.expires_at, now + Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_store_failure_carries_the_key() {
        struct FailingStore;

        #[async_trait]
        impl WindowStore for FailingStore {
            async fn remove_range(&self, key: &str, _: i64, _: i64) -> Result<()> {
                Err(SlidegateError::Store {
                    key: key.to_string(),
                    source: "connection refused".into(),
                })
            }
            async fn add_scored(&self, _: &str, _: i64, _: &str) -> Result<()> {
                unreachable!("remove_range fails first")
            }
            async fn count_range(&self, _: &str, _: i64, _: i64) -> Result<u64> {
                unreachable!("remove_range fails first")
            }
        }

        let strategy = SlidingWindow::new(Arc::new(FailingStore));
        let err = strategy.run(&limit_request("u1")).await.unwrap_err();
        match err {
            SlidegateError::Store { key, .. } => assert_eq!(key, "u1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_strategy_name_is_rejected() {
        let store: Arc<dyn WindowStore> = Arc::new(MemoryStore::new());
        let err = strategy_from_name("token_bucket", store, Arc::new(SystemClock), 8).unwrap_err();
        assert!(matches!(err, SlidegateError::UnknownStrategy(_)));
    }

    #[tokio::test]
    async fn test_metadata_fields() {
        let clock = manual_clock();
        let now = clock.now();
        let strategy = window(clock);

        let result = strategy.run(&limit_request("u1")).await.unwrap();
        let metadata = result.metadata();

        assert_eq!(metadata[0], (RATE_LIMITING_TOTAL_REQUESTS, "1".to_string()));
        assert_eq!(metadata[1], (RATE_LIMITING_STATE, "Allow".to_string()));
        assert_eq!(
            metadata[2],
            (
                RATE_LIMITING_EXPIRES_AT,
                (now + Duration::from_secs(10)).to_rfc3339()
            )
        );
    }
}
