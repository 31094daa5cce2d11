use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::ranker::Suggestion;
use crate::store::ScoreStore;

/// Sorted-set backed store. `ZINCRBY` gives the atomic increment.
///
/// Command errors are returned as the `redis` error itself.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects to `url`. Errors name only the host and port, never the
    /// credentials in the url.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let target = client.get_connection_info().addr.to_string();
        let conn = client
            .get_connection_manager()
            .await
            .with_context(|| format!("failed to connect to redis at {target}"))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ScoreStore for RedisStore {
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut conn = self.conn.clone();
        let score: f64 = conn.zincr(key, member, delta).await?;
        Ok(score)
    }

    async fn top_by_score(&self, key: &str, count: usize) -> Result<Vec<Suggestion>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let stop = isize::try_from(count - 1).unwrap_or(isize::MAX);
        let mut conn = self.conn.clone();
        let entries: Vec<(String, f64)> = conn.zrevrange_withscores(key, 0, stop).await?;
        Ok(entries
            .into_iter()
            .map(|(item, score)| Suggestion { item, score })
            .collect())
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.conn.clone();
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score)
    }
}
