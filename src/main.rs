//! docvec-ingest - document embedding ingestion pipeline.
//!
//! Discovers projects/documents from the upstream metadata API, fetches
//! PDF blobs from an S3-compatible object store, extracts and chunks
//! text (with OCR fallback), embeds and keyword-tags each chunk, and
//! persists documents/chunks/processing-logs into a vector-indexed
//! Postgres store (spec §1-§6).

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docvec_ingest::cli::Cli;
use docvec_ingest::config::Settings;
use docvec_ingest::embed::HashEmbedder;
use docvec_ingest::keywords::FrequencyKeywordExtractor;
use docvec_ingest::metadata_client::MetadataClient;
use docvec_ingest::object_store::ObjectFetcher;
use docvec_ingest::ocr::OcrRouter;
use docvec_ingest::orchestrator::Orchestrator;
use docvec_ingest::repository::{PersistenceStore, PgPool};

/// Exit codes per spec §6. Exit 2 (invalid arguments) is raised by `clap`
/// itself during `Cli::parse()`, including the `--retry-failed` /
/// `--retry-skipped` mutual-exclusivity check.
const EXIT_OK: u8 = 0;
const EXIT_STARTUP_ERROR: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let default_filter = "docvec_ingest=info";
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            tracing::info!(
                completed = summary.documents_completed,
                failed = summary.documents_failed,
                skipped = summary.documents_skipped,
                "run finished"
            );
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::from(EXIT_STARTUP_ERROR)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<docvec_ingest::RunSummary> {
    let settings = Settings::from_env()?;
    let settings = Arc::new(settings);

    let invocation = cli.into_invocation_config();

    let worker_count = invocation
        .worker_count_override
        .unwrap_or_else(|| settings.resolved_worker_count());

    // Connection pool sized `min(W, pool_cap)` with overflow capped at
    // `2*pool_cap` (spec §4.6). No separate `pool_cap` knob is exposed in
    // spec §6's environment surface, so `pool_cap` is taken to be the
    // resolved worker count itself -- `min(W, W) == W` -- letting
    // `PgPool::new`'s overflow multiplier still apply on top.
    let pool = PgPool::new(&settings.vector_db_url, worker_count)?;
    let store = Arc::new(PersistenceStore::new(
        pool,
        settings.chunk_insert_batch_size,
        settings.embedding_dimensions,
        worker_count,
    ));
    store
        .ensure_schema(settings.auto_create_pgvector_extension)
        .await?;

    let metadata_client = Arc::new(MetadataClient::from_settings(&settings));
    let object_fetcher = Arc::new(ObjectFetcher::from_settings(&settings)?);

    let ocr_router = if settings.ocr_enabled {
        Some(Arc::new(OcrRouter::from_settings(&settings)))
    } else {
        None
    };

    let embedder = Arc::new(HashEmbedder::new(settings.embedding_dimensions));
    let keyword_extractor = Arc::new(FrequencyKeywordExtractor);

    let orchestrator = Orchestrator::new(
        metadata_client,
        store,
        object_fetcher,
        ocr_router,
        embedder,
        keyword_extractor,
        Arc::clone(&settings),
    );

    let summary = orchestrator.run(invocation).await?;
    Ok(summary)
}
