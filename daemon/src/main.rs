mod config;
mod protocol;
mod server;

use std::sync::Arc;

use anyhow::Result;
use config::{DaemonConfig, StoreBackend};
use server::SuggestionServer;
use suggest_core::store::{MemoryStore, RedisStore, ScoreStore};
use suggest_core::SuggestionRanker;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = DaemonConfig::load()?;
    info!(
        socket = %config.server.socket_path.display(),
        request_timeout_ms = config.server.request_timeout_ms,
        backend = ?config.store.backend,
        collection = %config.ranker.collection_key,
        candidate_window = config.ranker.candidate_window,
        default_limit = config.ranker.default_limit,
        "loaded suggestd config"
    );

    let store: Arc<dyn ScoreStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.store.redis_url).await?),
    };
    let ranker = SuggestionRanker::new(store)
        .with_collection(config.ranker.collection_key.clone())
        .with_candidate_window(config.ranker.candidate_window);

    let server = SuggestionServer::new(config.server.clone(), ranker, config.ranker.default_limit);
    server.run().await
}
