use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ranker::{by_rank, Suggestion};
use crate::store::ScoreStore;

/// In-process score store. Increments hold the write lock for the whole
/// read-modify-write, so same-member updates never lose a delta.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, f64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut collections = self.collections.write().await;
        let score = collections
            .entry(key.to_string())
            .or_default()
            .entry(member.to_string())
            .or_insert(0.0);
        *score += delta;
        Ok(*score)
    }

    async fn top_by_score(&self, key: &str, count: usize) -> Result<Vec<Suggestion>> {
        let collections = self.collections.read().await;
        let Some(members) = collections.get(key) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<Suggestion> = members
            .iter()
            .map(|(item, score)| Suggestion {
                item: item.clone(),
                score: *score,
            })
            .collect();
        ranked.sort_by(by_rank);
        ranked.truncate(count);
        Ok(ranked)
    }

    async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(key)
            .and_then(|members| members.get(member))
            .copied())
    }
}
