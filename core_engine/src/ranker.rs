use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RankerError;
use crate::store::ScoreStore;

pub const DEFAULT_COLLECTION_KEY: &str = "autocomplete:suggestions";
pub const DEFAULT_CANDIDATE_WINDOW: usize = 100;
pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_SCORE_INCREMENT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub item: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestOptions {
    pub limit: usize,
}

impl SuggestOptions {
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Score descending, then item ascending.
pub(crate) fn by_rank(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.item.cmp(&b.item))
}

/// Popularity-ranked prefix completion over one collection of a [`ScoreStore`].
///
/// Queries only look at the `candidate_window` highest-scored members of the
/// collection before filtering by prefix. A member that matches the prefix but
/// ranks below the window is not returned. There is no prefix index; raise the
/// window if the pool outgrows it.
#[derive(Clone)]
pub struct SuggestionRanker {
    store: Arc<dyn ScoreStore>,
    collection: String,
    candidate_window: usize,
}

impl SuggestionRanker {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            store,
            collection: DEFAULT_COLLECTION_KEY.to_string(),
            candidate_window: DEFAULT_CANDIDATE_WINDOW,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_candidate_window(mut self, candidate_window: usize) -> Self {
        self.candidate_window = candidate_window.max(1);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn candidate_window(&self) -> usize {
        self.candidate_window
    }

    /// Adds `score_increment` to `item`, creating it if new. Zero and negative
    /// increments are applied as given. Returns the accumulated score.
    pub async fn add_suggestion(
        &self,
        item: &str,
        score_increment: f64,
    ) -> Result<f64, RankerError> {
        validate_item(item)?;
        if !score_increment.is_finite() {
            return Err(RankerError::InvalidArgument(format!(
                "score increment must be finite, got {score_increment}"
            )));
        }

        let score = self
            .store
            .increment(&self.collection, item, score_increment)
            .await?;
        debug!(
            collection = %self.collection,
            item,
            increment = score_increment,
            score,
            "updated suggestion"
        );
        Ok(score)
    }

    pub async fn add_suggestion_once(&self, item: &str) -> Result<f64, RankerError> {
        self.add_suggestion(item, DEFAULT_SCORE_INCREMENT).await
    }

    /// Best-scored members starting with `prefix`, at most `options.limit`.
    /// An empty prefix matches everything; a zero limit returns without a
    /// store round-trip.
    pub async fn get_suggestions(
        &self,
        prefix: &str,
        options: SuggestOptions,
    ) -> Result<Vec<Suggestion>, RankerError> {
        if options.limit < 1 {
            return Ok(Vec::new());
        }

        let mut candidates = self
            .store
            .top_by_score(&self.collection, self.candidate_window)
            .await?;
        candidates.truncate(self.candidate_window);
        candidates.sort_by(by_rank);

        let scanned = candidates.len();
        let matches: Vec<Suggestion> = candidates
            .into_iter()
            .filter(|candidate| candidate.item.starts_with(prefix))
            .take(options.limit)
            .collect();
        debug!(
            collection = %self.collection,
            prefix,
            limit = options.limit,
            scanned,
            matched = matches.len(),
            "served suggestions"
        );
        Ok(matches)
    }

    pub async fn score(&self, item: &str) -> Result<Option<f64>, RankerError> {
        validate_item(item)?;
        Ok(self.store.score(&self.collection, item).await?)
    }
}

fn validate_item(item: &str) -> Result<(), RankerError> {
    if item.is_empty() {
        return Err(RankerError::InvalidArgument(
            "suggestion item must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}
