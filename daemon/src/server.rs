use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use suggest_core::{RankerError, SuggestionRanker};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::protocol::{
    AddResponse, DaemonRequest, DaemonResponse, ErrorCode, ErrorResponse, RequestBody,
    ResponseBody, ScoreResponse, SuggestResponse,
};

pub struct SuggestionServer {
    config: ServerConfig,
    handler: Arc<RequestHandler>,
}

impl SuggestionServer {
    pub fn new(config: ServerConfig, ranker: SuggestionRanker, default_limit: usize) -> Self {
        let handler = RequestHandler {
            ranker,
            default_limit,
            timeout_ms: config.request_timeout_ms,
        };
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.prepare_socket_path().await?;
        if self.config.socket_path.exists() {
            fs::remove_file(&self.config.socket_path)
                .await
                .with_context(|| {
                    format!(
                        "failed to cleanup stale socket {}",
                        self.config.socket_path.display()
                    )
                })?;
        }

        let listener = UnixListener::bind(&self.config.socket_path).with_context(|| {
            format!(
                "failed to bind unix socket at {}",
                self.config.socket_path.display()
            )
        })?;
        info!(
            "suggestd listening on {}",
            self.config.socket_path.display()
        );

        loop {
            let (stream, _) = listener.accept().await?;
            let handler = self.handler.clone();
            tokio::spawn(async move {
                if let Err(error) = handle_connection(stream, handler).await {
                    warn!("connection closed with error: {error:#}");
                }
            });
        }
    }

    async fn prepare_socket_path(&self) -> Result<()> {
        if let Some(parent) = Path::new(&self.config.socket_path).parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create socket directory {}", parent.display())
            })?;
        }
        Ok(())
    }
}

struct RequestHandler {
    ranker: SuggestionRanker,
    default_limit: usize,
    timeout_ms: u64,
}

impl RequestHandler {
    async fn process_line(&self, line: &str) -> DaemonResponse {
        match serde_json::from_str::<DaemonRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(error) => {
                error!("invalid request JSON: {error}");
                DaemonResponse {
                    id: String::new(),
                    body: ResponseBody::Error(ErrorResponse {
                        code: ErrorCode::InvalidRequest,
                        message: format!("invalid JSON payload: {error}"),
                    }),
                }
            }
        }
    }

    async fn handle_request(&self, request: DaemonRequest) -> DaemonResponse {
        let ranker = &self.ranker;
        let body = match request.body {
            RequestBody::Ping => ResponseBody::Pong,
            // Never cancelled: a dropped increment may already be applied.
            RequestBody::Add(add) => match ranker
                .add_suggestion(&add.item, add.score_increment)
                .await
            {
                Ok(score) => ResponseBody::Added(AddResponse {
                    item: add.item,
                    score,
                }),
                Err(error) => error_body(&error),
            },
            RequestBody::Suggest(suggest) => {
                let options = suggest.options(self.default_limit);
                self.bounded(async move {
                    let suggestions = ranker.get_suggestions(&suggest.prefix, options).await?;
                    Ok(ResponseBody::Suggestions(SuggestResponse { suggestions }))
                })
                .await
            }
            RequestBody::Score(lookup) => {
                self.bounded(async move {
                    let score = ranker.score(&lookup.item).await?;
                    Ok(ResponseBody::Score(ScoreResponse {
                        item: lookup.item,
                        score,
                    }))
                })
                .await
            }
        };
        DaemonResponse {
            id: request.id,
            body,
        }
    }

    async fn bounded<F>(&self, work: F) -> ResponseBody
    where
        F: Future<Output = Result<ResponseBody, RankerError>>,
    {
        let timeout_ms = self.timeout_ms.max(1);
        match timeout(Duration::from_millis(timeout_ms), work).await {
            Ok(Ok(body)) => body,
            Ok(Err(error)) => error_body(&error),
            Err(_) => ResponseBody::Error(ErrorResponse {
                code: ErrorCode::Timeout,
                message: format!("request exceeded {timeout_ms}ms"),
            }),
        }
    }
}

fn error_body(error: &RankerError) -> ResponseBody {
    let code = match error {
        RankerError::InvalidArgument(_) => ErrorCode::InvalidArgument,
        RankerError::Store(_) => {
            warn!("score store failed: {error:#}");
            ErrorCode::Store
        }
    };
    ResponseBody::Error(ErrorResponse {
        code,
        message: format!("{error:#}"),
    })
}

async fn handle_connection(stream: UnixStream, handler: Arc<RequestHandler>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handler.process_line(&line).await;
        let payload = serde_json::to_string(&response)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use suggest_core::store::{MemoryStore, ScoreStore};
    use suggest_core::Suggestion;

    use super::*;
    use crate::protocol::{AddRequest, SuggestRequest};

    struct FailingStore;

    #[async_trait]
    impl ScoreStore for FailingStore {
        async fn increment(&self, _key: &str, _member: &str, _delta: f64) -> Result<f64> {
            Err(anyhow!("connection refused"))
        }

        async fn top_by_score(&self, _key: &str, _count: usize) -> Result<Vec<Suggestion>> {
            Err(anyhow!("connection refused"))
        }

        async fn score(&self, _key: &str, _member: &str) -> Result<Option<f64>> {
            Err(anyhow!("connection refused"))
        }
    }

    /// Applies the increment, then acknowledges slowly.
    #[derive(Default)]
    struct SlowAckStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ScoreStore for SlowAckStore {
        async fn increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
            let score = self.inner.increment(key, member, delta).await?;
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(score)
        }

        async fn top_by_score(&self, key: &str, count: usize) -> Result<Vec<Suggestion>> {
            self.inner.top_by_score(key, count).await
        }

        async fn score(&self, key: &str, member: &str) -> Result<Option<f64>> {
            self.inner.score(key, member).await
        }
    }

    struct StalledStore;

    #[async_trait]
    impl ScoreStore for StalledStore {
        async fn increment(&self, _key: &str, _member: &str, delta: f64) -> Result<f64> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(delta)
        }

        async fn top_by_score(&self, _key: &str, _count: usize) -> Result<Vec<Suggestion>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn score(&self, _key: &str, _member: &str) -> Result<Option<f64>> {
            Ok(None)
        }
    }

    fn handler_with(store: Arc<dyn ScoreStore>, timeout_ms: u64) -> RequestHandler {
        RequestHandler {
            ranker: SuggestionRanker::new(store),
            default_limit: 5,
            timeout_ms,
        }
    }

    fn memory_handler() -> RequestHandler {
        handler_with(Arc::new(MemoryStore::new()), 100)
    }

    fn add(id: &str, item: &str, score_increment: f64) -> DaemonRequest {
        DaemonRequest {
            id: id.to_string(),
            body: RequestBody::Add(AddRequest {
                item: item.to_string(),
                score_increment,
            }),
        }
    }

    fn suggest(prefix: &str, limit: Option<i64>) -> DaemonRequest {
        DaemonRequest {
            id: "q".to_string(),
            body: RequestBody::Suggest(SuggestRequest {
                prefix: prefix.to_string(),
                limit,
            }),
        }
    }

    fn error_code(response: &DaemonResponse) -> ErrorCode {
        match &response.body {
            ResponseBody::Error(error) => error.code,
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handles_ping() {
        let handler = memory_handler();
        let request = DaemonRequest {
            id: "1".to_string(),
            body: RequestBody::Ping,
        };

        let response = handler.handle_request(request).await;
        assert!(matches!(response.body, ResponseBody::Pong));
        assert_eq!(response.id, "1");
    }

    #[tokio::test]
    async fn adds_then_suggests() {
        let handler = memory_handler();
        handler.handle_request(add("1", "apple", 1.0)).await;
        handler.handle_request(add("2", "banana", 1.0)).await;
        let response = handler.handle_request(add("3", "banana", 1.0)).await;
        match response.body {
            ResponseBody::Added(added) => {
                assert_eq!(added.item, "banana");
                assert_eq!(added.score, 2.0);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let response = handler.handle_request(suggest("b", None)).await;
        match response.body {
            ResponseBody::Suggestions(found) => {
                assert_eq!(found.suggestions.len(), 1);
                assert_eq!(found.suggestions[0].item, "banana");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_limit_is_empty() {
        let handler = memory_handler();
        handler.handle_request(add("1", "foo", 5.0)).await;

        let response = handler.handle_request(suggest("f", Some(-1))).await;
        match response.body {
            ResponseBody::Suggestions(found) => assert!(found.suggestions.is_empty()),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_score_lookups() {
        let handler = memory_handler();
        handler.handle_request(add("1", "minus", -5.0)).await;

        let response = handler
            .process_line(r#"{"id":"s","type":"score","item":"minus"}"#)
            .await;
        match response.body {
            ResponseBody::Score(found) => assert_eq!(found.score, Some(-5.0)),
            other => panic!("unexpected response: {other:?}"),
        }

        let response = handler
            .process_line(r#"{"type":"score","item":"nosuchitem"}"#)
            .await;
        match response.body {
            ResponseBody::Score(found) => assert_eq!(found.score, None),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_item_is_invalid_argument() {
        let handler = memory_handler();
        let response = handler.handle_request(add("1", "", 1.0)).await;
        assert_eq!(error_code(&response), ErrorCode::InvalidArgument);
        assert_eq!(response.id, "1");
    }

    #[tokio::test]
    async fn malformed_items_are_invalid_requests() {
        let handler = memory_handler();
        for line in [
            r#"{"type":"add","item":null}"#,
            r#"{"type":"add","item":123}"#,
            "not json",
        ] {
            let response = handler.process_line(line).await;
            assert_eq!(error_code(&response), ErrorCode::InvalidRequest, "{line}");
        }
    }

    #[tokio::test]
    async fn store_failure_maps_to_store_error() {
        let handler = handler_with(Arc::new(FailingStore), 100);
        let response = handler.handle_request(suggest("a", None)).await;
        match response.body {
            ResponseBody::Error(error) => {
                assert_eq!(error.code, ErrorCode::Store);
                assert!(error.message.contains("connection refused"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let handler = handler_with(Arc::new(StalledStore), 10);
        let response = handler.handle_request(suggest("a", None)).await;
        assert_eq!(error_code(&response), ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn slow_acknowledged_adds_report_their_score() {
        let store = Arc::new(SlowAckStore::default());
        let handler = handler_with(store.clone(), 10);

        for (id, expected) in [("1", 1.0), ("2", 2.0)] {
            let response = handler.handle_request(add(id, "apple", 1.0)).await;
            match response.body {
                ResponseBody::Added(added) => assert_eq!(added.score, expected),
                other => panic!("unexpected response: {other:?}"),
            }
        }
        let stored = store
            .score("autocomplete:suggestions", "apple")
            .await
            .unwrap();
        assert_eq!(stored, Some(2.0));
    }

    #[tokio::test]
    async fn serves_over_unix_socket() {
        let socket_path: PathBuf = std::env::temp_dir()
            .join(format!("suggestd-test-{}", std::process::id()))
            .join("suggestd.sock");
        let config = ServerConfig {
            socket_path: socket_path.clone(),
            request_timeout_ms: 500,
        };
        let server = SuggestionServer::new(
            config,
            SuggestionRanker::new(Arc::new(MemoryStore::new())),
            5,
        );
        let serving = tokio::spawn(async move { server.run().await });

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(connected) = UnixStream::connect(&socket_path).await {
                stream = Some(connected);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stream = stream.expect("server did not start");
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"id\":\"a\",\"type\":\"add\",\"item\":\"apricot\"}\n\n")
            .await
            .unwrap();
        writer
            .write_all(b"{\"id\":\"b\",\"type\":\"suggest\",\"prefix\":\"ap\"}\n")
            .await
            .unwrap();

        let added: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(added["type"], "added");
        assert_eq!(added["score"], 1.0);

        let found: serde_json::Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(found["id"], "b");
        assert_eq!(found["suggestions"][0]["item"], "apricot");

        serving.abort();
        let _ = std::fs::remove_file(&socket_path);
    }
}
