use anyhow::Context;
use cocreate_common::config::AppConfig;
use cocreate_core::{create_graph_store, create_llm_client, ChatHistory, ChatRelay, IngestionPipeline};
use std::sync::Arc;

mod api;

use api::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!("Loaded .env from: {:?}", path),
        Err(e) => tracing::warn!("Failed to load .env file: {}. Using system environment variables.", e),
    }

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing::info!("Using graph backend: {:?} ({})", config.graph.backend, config.graph.uri);
    tracing::info!("Using LLM Provider: {:?}", config.llm.provider);
    tracing::info!("Using LLM Model: {}", config.get_model_name());

    let graph = create_graph_store(&config.graph)
        .await
        .context("Failed to connect to the graph database")?;
    tracing::info!("Graph store ready");

    let mut chat = ChatRelay::new(create_llm_client(&config.llm));
    if !chat.is_configured() {
        tracing::warn!("LLM credentials missing; /api/chat will return errors until they are configured");
    }
    if config.history_enabled() {
        let history = ChatHistory::open(&config.chat.history_dir)
            .context("Failed to open chat history store")?;
        chat = chat.with_history(history, config.chat.history_turns);
    } else {
        tracing::info!("Chat history disabled");
    }

    let state = Arc::new(AppState {
        pipeline: IngestionPipeline::new(graph),
        chat,
        config: config.clone(),
    });

    let app = api::router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install CTRL+C handler: {}", e);
            }
            tracing::info!("Shutdown signal received.");
        })
        .await?;

    tracing::info!("CoCreateAI Server stopped.");
    Ok(())
}
