//! Redis-backed window store.
//!
//! Maps the window protocol onto Redis sorted sets: ZREMRANGEBYSCORE for
//! expiry, ZADD for recording, ZCOUNT for occupancy. The batched step runs
//! all three in a single pipelined round trip.

use async_trait::async_trait;
use redis::AsyncCommands;

use super::WindowStore;
use crate::error::{Result, SlidegateError};

/// A [`WindowStore`] backed by a Redis sorted set per key.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Create a store over an existing Redis client.
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Create a store by connection URL, e.g. `redis://127.0.0.1/`.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SlidegateError::Config(format!("invalid redis URL: {}", e)))?;
        Ok(Self { client })
    }

    async fn connection(&self, key: &str) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| wrap(key, e))
    }
}

/// Render a score bound, using Redis infinity markers for the extremes so
/// full-range queries do not depend on float conversion of `i64::MIN/MAX`.
fn bound(value: i64) -> String {
    if value == i64::MIN {
        "-inf".to_string()
    } else if value == i64::MAX {
        "+inf".to_string()
    } else {
        value.to_string()
    }
}

fn wrap(key: &str, source: redis::RedisError) -> SlidegateError {
    SlidegateError::Store {
        key: key.to_string(),
        source: Box::new(source),
    }
}

#[async_trait]
impl WindowStore for RedisStore {
    async fn remove_range(&self, key: &str, min: i64, max: i64) -> Result<()> {
        let mut conn = self.connection(key).await?;
        let _: i64 = conn
            .zrembyscore(key, bound(min), bound(max))
            .await
            .map_err(|e| wrap(key, e))?;
        Ok(())
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<()> {
        let mut conn = self.connection(key).await?;
        let _: i64 = conn
            .zadd(key, member, score)
            .await
            .map_err(|e| wrap(key, e))?;
        Ok(())
    }

    async fn count_range(&self, key: &str, min: i64, max: i64) -> Result<u64> {
        let mut conn = self.connection(key).await?;
        let count: u64 = conn
            .zcount(key, bound(min), bound(max))
            .await
            .map_err(|e| wrap(key, e))?;
        Ok(count)
    }

    async fn prune_record_count(
        &self,
        key: &str,
        cutoff: i64,
        now: i64,
        member: &str,
    ) -> Result<u64> {
        let mut conn = self.connection(key).await?;

        let (_removed, _added, count): (i64, i64, u64) = redis::pipe()
            .zrembyscore(key, 0, cutoff)
            .zadd(key, member, now)
            .zcount(key, "-inf", "+inf")
            .query_async(&mut conn)
            .await
            .map_err(|e| wrap(key, e))?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_rendering() {
        assert_eq!(bound(i64::MIN), "-inf");
        assert_eq!(bound(i64::MAX), "+inf");
        assert_eq!(bound(0), "0");
        assert_eq!(bound(1_700_000_000_000_000_000), "1700000000000000000");
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(RedisStore::open("not-a-url").is_err());
    }
}
