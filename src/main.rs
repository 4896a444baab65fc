use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docchat::config::Config;
use docchat::llm::LanguageModel;
use docchat::llm::mock::MockLlm;
use docchat::llm::openai::OpenAiClient;
use docchat::search::engine::SearchEngine;
use docchat::store::VectorStore;
use docchat::store::memory::MemoryStore;

#[derive(Parser)]
#[command(name = "docchat", about = "Document-chat RAG core")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = "")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting docchat...");

    let cli = Cli::parse();

    // 1. Load and validate config
    let config = Arc::new(Config::load(&cli.config).context("Failed to load config")?);
    config.validate().context("Invalid configuration")?;

    // 2. Language model: real client when a key is present, mock otherwise
    let llm: Arc<dyn LanguageModel> = match std::env::var(&config.llm.api_key_env) {
        Ok(api_key) if !api_key.is_empty() => Arc::new(OpenAiClient::new(
            config.llm.api_base.clone(),
            api_key,
            config.llm.chat_model.clone(),
            config.llm.embedding_model.clone(),
            config.llm.dimensions,
            config.llm.embed_input_limit,
        )),
        _ => {
            warn!(
                "{} not set, running in demo mode with a mock model",
                config.llm.api_key_env
            );
            Arc::new(MockLlm::new(config.llm.dimensions))
        }
    };

    // 3. Vector store (in-memory reference implementation)
    let store: Arc<dyn VectorStore> = Arc::new(MemoryStore::new());

    // 4. Engine
    let engine = SearchEngine::new(store.clone(), llm, config.clone());

    let collections = store
        .list_collections()
        .await
        .map(|names| names.len())
        .unwrap_or(0);
    info!(
        "Engine ready: {collections} collections, chunk_size={}, top_k={}, cached_searches={}",
        config.chunk_size,
        config.search_top_k,
        engine.cache().len()
    );

    Ok(())
}
