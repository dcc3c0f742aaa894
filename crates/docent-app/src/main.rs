//! Docent application binary - composition root.
//!
//! Ties together all Docent crates into a single long-running service:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Construct the Ollama chat and embedding clients
//! 4. Build the ingestion pipeline and the conversational router
//! 5. Start the axum HTTP/SSE transport

use std::sync::Arc;

use clap::Parser;

use docent_api::{create_router, AppState};
use docent_chat::{Assistant, SessionStore};
use docent_core::config::DocentConfig;
use docent_llm::chat::OllamaChatModel;
use docent_llm::embedding::OllamaEmbedding;
use docent_vector::pipeline::IngestPipeline;
use docent_vector::splitter::TextSplitter;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = DocentConfig::load_or_default(&config_file);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Docent v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Collaborator clients.
    let ollama_host = args.resolve_ollama_host(&config.llm.host);
    let model = OllamaChatModel::new(ollama_host.as_str(), config.llm.request_timeout_secs)?;
    let embedder = OllamaEmbedding::new(
        ollama_host.as_str(),
        config.embedding.model.as_str(),
        config.llm.request_timeout_secs,
    )?;
    tracing::info!(
        host = %ollama_host,
        embedding_model = %config.embedding.model,
        "Ollama clients ready"
    );

    // Ingestion pipeline.
    let splitter = TextSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    let embedder = Arc::new(embedder);
    let pipeline = IngestPipeline::new(splitter, embedder.clone());

    // Conversational router.
    let assistant = Arc::new(Assistant::new(
        Arc::new(model),
        embedder,
        Arc::new(SessionStore::new()),
        pipeline,
        config.retrieval.top_k,
    ));
    tracing::info!(top_k = config.retrieval.top_k, "Assistant ready");

    // HTTP transport.
    let state = AppState::new(assistant, config.ingest.max_upload_mb);
    let router = create_router(state);

    let port = args.resolve_port(config.general.port);
    let addr = format!("{}:{}", config.general.bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP transport listening");

    axum::serve(listener, router).await?;
    Ok(())
}
