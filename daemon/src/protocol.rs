use serde::{Deserialize, Serialize};
use suggest_core::{SuggestOptions, Suggestion, DEFAULT_SCORE_INCREMENT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonRequest {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: RequestBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBody {
    Add(AddRequest),
    Suggest(SuggestRequest),
    Score(ScoreRequest),
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    Added(AddResponse),
    Suggestions(SuggestResponse),
    Score(ScoreResponse),
    Pong,
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidArgument,
    Store,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRequest {
    pub item: String,
    #[serde(default = "default_score_increment")]
    pub score_increment: f64,
}

fn default_score_increment() -> f64 {
    DEFAULT_SCORE_INCREMENT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub prefix: String,
    /// Signed so that clients sending a negative limit get an empty result
    /// rather than a parse error.
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SuggestRequest {
    pub fn options(&self, default_limit: usize) -> SuggestOptions {
        let limit = match self.limit {
            Some(limit) => usize::try_from(limit).unwrap_or(0),
            None => default_limit,
        };
        SuggestOptions::with_limit(limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    pub item: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResponse {
    pub item: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub item: String,
    pub score: Option<f64>,
}
