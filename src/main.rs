use anyhow::Context;
use course_rag::api::{create_router, AppState};
use course_rag::application::{DocumentProcessor, RagSystem, SessionManager};
use course_rag::domain::ports::EmbeddingService;
use course_rag::infrastructure::{
    build_vector_store, AnthropicGenerator, Config, LogFormat, TextEmbedding,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "course_rag=debug,api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.server.log_format);

    let embedding: Arc<dyn EmbeddingService> = Arc::new(TextEmbedding::from_config(&config.embedding)?);
    let store = build_vector_store(&config.vector_store, &config.rag, embedding).await?;
    info!(backend = ?config.vector_store.backend, "vector store ready");

    let generator = Arc::new(AnthropicGenerator::from_config(&config.llm)?);
    let rag = Arc::new(RagSystem::new(
        DocumentProcessor::new(config.rag.chunk_size, config.rag.chunk_overlap),
        store,
        generator,
        SessionManager::new(config.rag.max_history),
    ));

    let report = rag
        .add_course_folder(&config.rag.docs_dir, config.rag.reindex_on_startup)
        .await?;
    info!(
        courses = report.courses_added,
        chunks = report.chunks_added,
        skipped = report.skipped.len(),
        "course documents loaded"
    );
    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.error, "course file not loaded");
    }

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let app = create_router(AppState::new(rag, config));

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
