//! In-process window store.
//!
//! Holds window state in a concurrent map instead of an external store.
//! Suitable for tests and single-process deployments; state is lost on
//! restart and is not shared across processes.

use async_trait::async_trait;
use dashmap::DashMap;

use super::WindowStore;
use crate::error::Result;

/// A [`WindowStore`] backed by a [`DashMap`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<(i64, String)>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
impl WindowStore for MemoryStore {
    async fn remove_range(&self, key: &str, min: i64, max: i64) -> Result<()> {
        if let Some(mut entries) = self.entries.get_mut(key) {
            entries.retain(|(score, _)| *score < min || *score > max);
        }
        Ok(())
    }

    async fn add_scored(&self, key: &str, score: i64, member: &str) -> Result<()> {
        self.entries
            .entry(key.to_string())
            .or_default()
            .push((score, member.to_string()));
        Ok(())
    }

    async fn count_range(&self, key: &str, min: i64, max: i64) -> Result<u64> {
        let count = self
            .entries
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(score, _)| *score >= min && *score <= max)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }
}
