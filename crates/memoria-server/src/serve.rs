//! Composition root: open the store, build the embedding provider
//! chain, wire up `AppState`, and serve HTTP until `ctrl_c`. Grounded on
//! the reference crate's `serve.rs` (init-log-each-step, then
//! `axum::serve` + signal-driven shutdown), trimmed of the gRPC/NATS/
//! auto-linker/briefing machinery this workspace has no use for.

use crate::config::Config;
use crate::embed::QueryEmbedder;
use crate::http::routes::create_router;
use crate::http::AppState;
use crate::providers::{OpenAiProvider, VoyageProvider};
use memoria_core::cee::{FallbackEmbedder, FastEmbedProvider, Provider};
use memoria_core::ports::NoopLLMPort;
use memoria_core::storage::RedbStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub async fn run(config: Config) -> anyhow::Result<()> {
    info!("opening store at {}", config.db_path().display());
    let store = Arc::new(RedbStore::open(config.db_path())?);

    info!("loading local embedding model (minilm-v6)");
    let local = FastEmbedProvider::new()?;
    let providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(OpenAiProvider::new()),
        Arc::new(VoyageProvider::new()),
        Arc::new(local),
    ];
    let fallback = Arc::new(FallbackEmbedder::new(providers));
    let query_embedder = Arc::new(QueryEmbedder(fallback.clone()));

    let state = AppState {
        store: store.clone(),
        fallback,
        query_embedder,
        behavior: store.clone(),
        llm: Arc::new(NoopLLMPort),
        ingest_config: Arc::new(config.ingest),
        spread_config: Arc::new(config.spread),
        rerank_config: Arc::new(config.rerank),
        started_at: Instant::now(),
    };

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!("listening on {}", config.http_addr);

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    server.await?;
    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("ctrl-c received, shutting down");
}
