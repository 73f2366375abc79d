//! Trip planner - LLM-driven multi-city travel planning
//!
//! A Rust backend that runs a tool-using planning loop over a persisted,
//! schema-validated trip plan.

mod api;
mod config;
mod db;
mod llm;
mod plan;
mod runtime;
mod state_machine;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::{LlmConfig, ModelRegistry};
use runtime::{DatabaseStore, LlmReasoner, RuntimeManager, ToolExecutor, ToolRegistryExecutor};
use std::net::SocketAddr;
use std::sync::Arc;
use tools::{ToolConfig, ToolRegistry};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trip_planner=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    // Initialize LLM registry
    let llm_config = LlmConfig::from_env();
    let llm_registry = Arc::new(ModelRegistry::new(&llm_config));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set ANTHROPIC_API_KEY or LLM_GATEWAY.");
    }

    let tools = Arc::new(ToolRegistryExecutor::new(
        Arc::new(ToolRegistry::standard()),
        Arc::new(ToolConfig::from_env()),
        Arc::clone(&llm_registry),
        config.tool_timeout,
    ));
    let reasoner = Arc::new(LlmReasoner::new(
        Arc::clone(&llm_registry),
        tools.definitions(),
    ));
    let runtime = RuntimeManager::new(
        reasoner,
        Arc::new(DatabaseStore::new(db)),
        tools,
        config.turn_limits(),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(runtime))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Trip planner listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
