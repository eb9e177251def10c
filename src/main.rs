//! Protocol Assist Service - Main Entry Point
//!
//! A clinical decision-support API composing vector retrieval over trauma
//! care protocols with language-model generation.

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protocol_assist::config::Config;
use protocol_assist::handlers::{self, AppState};
use protocol_assist::services::{EmbeddingClient, Generator, OpenAiClient};
use protocol_assist::vector_db::{ChromaClient, DocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "protocol_assist=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    info!("🔷 Starting Protocol Assist Service v{}", env!("CARGO_PKG_VERSION"));
    info!("Port: {}", config.port);

    // Initialize the vector store client; queries run degraded if it fails
    let embedder = EmbeddingClient::new(
        &config.openai_base_url,
        &config.openai_api_key,
        &config.embedding_model,
    );
    let store: Option<Arc<dyn DocumentStore>> =
        match ChromaClient::connect(&config.chroma_url, &config.chroma_collection, embedder).await {
            Ok(client) => {
                info!("✅ Chroma connection established");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!("⚠️ Chroma connection failed: {}. Queries will be rejected.", e);
                None
            }
        };

    // Initialize the generation client
    let generator: Option<Arc<dyn Generator>> = match OpenAiClient::new(&config) {
        Ok(client) => {
            info!("✅ OpenAI client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("⚠️ OpenAI client unavailable: {}. Queries will be rejected.", e);
            None
        }
    };

    // Build application state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        generator,
    });

    // Build HTTP routes
    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/query", post(handlers::process_query))
        // State
        .with_state(state)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("🚀 Protocol Assist Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
