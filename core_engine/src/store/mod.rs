mod memory;
mod redis_store;

use anyhow::Result;
use async_trait::async_trait;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;
use crate::ranker::Suggestion;

/// Ordered member/score collections, partitioned by collection key.
///
/// `increment` must be atomic per (key, member): concurrent deltas on the same
/// member compose into their sum.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Adds `delta` to `member` under `key`, creating it at `delta` if absent.
    /// Returns the new score.
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Up to `count` entries of `key`, highest score first.
    async fn top_by_score(&self, key: &str, count: usize) -> Result<Vec<Suggestion>>;

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>>;
}
