//! External window store protocol and backends.

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::error::Result;

/// Ordered-set store a sliding window is evaluated against.
///
/// Each rate-limiting key maps to a collection of (score, member) pairs
/// where scores are timestamps in nanoseconds since the Unix epoch and
/// members are unique event identifiers.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Remove every entry for `key` with a score in `[min, max]`.
    async fn remove_range(&self, key: &str, min: i64, max: i64) -> Result<()>;

    /// Insert a member for `key` with the given score.
    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<()>;

    /// Count entries for `key` with a score in `[min, max]`.
    async fn count_range(&self, key: &str, min: i64, max: i64) -> Result<u64>;

    /// The full sliding-window step: drop entries at or below `cutoff`,
    /// record the new event at `now`, and return the resulting occupancy.
    ///
    /// The default implementation issues the three primitives in sequence;
    /// backends that can batch should override it to keep the step to one
    /// round trip.
    async fn prune_record_count(
        &self,
        key: &str,
        cutoff: i64,
        now: i64,
        member: &str,
    ) -> Result<u64> {
        self.remove_range(key, 0, cutoff).await?;
        self.add_scored(key, now, member).await?;
        self.count_range(key, i64::MIN, i64::MAX).await
    }
}
