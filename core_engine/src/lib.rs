mod error;
mod ranker;
pub mod store;

pub use error::RankerError;
pub use ranker::{
    SuggestOptions, Suggestion, SuggestionRanker, DEFAULT_CANDIDATE_WINDOW,
    DEFAULT_COLLECTION_KEY, DEFAULT_LIMIT, DEFAULT_SCORE_INCREMENT,
};
