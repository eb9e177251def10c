//! Batch ingestion CLI
//!
//! Chunks protocol documents and writes them into the vector store.
//! Runs offline against the same store the query service reads.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use protocol_assist::config::Config;
use protocol_assist::ingest::IngestPipeline;
use protocol_assist::services::EmbeddingClient;
use protocol_assist::vector_db::{ChromaClient, DocumentStore};

#[derive(Parser)]
#[command(
    name = "protocol-ingest",
    about = "Ingest protocol documents (.pdf, .txt) into the vector store"
)]
struct Args {
    /// File or directory to ingest
    path: PathBuf,

    /// Source label for single-file text ingestion (defaults to the file stem)
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "protocol_assist=info,protocol_ingest=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env();
    let args = Args::parse();

    let embedder = EmbeddingClient::new(
        &config.openai_base_url,
        &config.openai_api_key,
        &config.embedding_model,
    );
    let store: Arc<dyn DocumentStore> = Arc::new(
        ChromaClient::connect(&config.chroma_url, &config.chroma_collection, embedder)
            .await
            .context("Could not reach the vector store")?,
    );

    let pipeline = IngestPipeline::new(store.clone());

    if args.path.is_dir() {
        let summary = pipeline.ingest_directory(&args.path).await?;
        info!(
            "Ingestion complete: {} files processed, {} skipped, {} chunks added",
            summary.files_processed, summary.files_skipped, summary.chunks_added
        );
    } else {
        let extension = args
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let added = match extension.as_deref() {
            Some("pdf") => pipeline.ingest_pdf_file(&args.path).await?,
            Some("txt") => pipeline
                .ingest_text_file(&args.path, args.source.as_deref())
                .await?,
            _ => anyhow::bail!("Unsupported file type: {}", args.path.display()),
        };
        info!("✅ Ingested {} ({} chunks)", args.path.display(), added);
    }

    let total = store.count().await?;
    info!("Total documents in collection: {}", total);

    Ok(())
}
