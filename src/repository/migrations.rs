//! Schema + pgvector extension bootstrap (spec §4.6, §6). Raw SQL rather
//! than Diesel's migration framework, matching the teacher's own
//! `migration_postgres.rs` approach of hand-written idempotent DDL run at
//! startup instead of a `diesel migration run` step baked into the binary.

use diesel_async::RunQueryDsl;

use super::pool::{DbError, PgConn};

const CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS vector";

const CREATE_PROJECTS: &str = "
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    project_name TEXT NOT NULL,
    metadata JSONB
)";

fn create_documents(dimensions: u32) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(project_id),
    document_keywords TEXT[] NOT NULL DEFAULT '{{}}',
    document_tags TEXT[] NOT NULL DEFAULT '{{}}',
    document_headings TEXT[] NOT NULL DEFAULT '{{}}',
    document_metadata JSONB NOT NULL DEFAULT '{{}}',
    embedding VECTOR({dimensions}),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"
    )
}

fn create_document_chunks(dimensions: u32) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS document_chunks (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    metadata JSONB NOT NULL DEFAULT '{{}}',
    embedding VECTOR({dimensions}) NOT NULL,
    document_id TEXT NOT NULL REFERENCES documents(document_id),
    project_id TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"
    )
}

const CREATE_PROCESSING_LOGS: &str = "
CREATE TABLE IF NOT EXISTS processing_logs (
    id BIGSERIAL PRIMARY KEY,
    document_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    status TEXT NOT NULL,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    metrics JSONB NOT NULL DEFAULT '{}'
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_documents_project_id ON documents (project_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_keywords ON documents USING GIN (document_keywords)",
    "CREATE INDEX IF NOT EXISTS idx_documents_tags ON documents USING GIN (document_tags)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON document_chunks (document_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_project_id ON document_chunks (project_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_content_tsv ON document_chunks USING GIN (to_tsvector('simple', content))",
    "CREATE INDEX IF NOT EXISTS idx_processing_logs_document_id ON processing_logs (document_id)",
];

/// Approximate-nearest-neighbor indexes, built separately since they are
/// the part the orchestrator's `--skip-hnsw-indexes` flag can skip.
fn ann_indexes() -> Vec<&'static str> {
    vec![
        "CREATE INDEX IF NOT EXISTS idx_documents_embedding_ann ON documents USING hnsw (embedding vector_cosine_ops)",
        "CREATE INDEX IF NOT EXISTS idx_chunks_embedding_ann ON document_chunks USING hnsw (embedding vector_cosine_ops)",
    ]
}

/// Ensure the pgvector extension, the four tables, and the non-ANN indexes
/// exist. Always runs at startup (spec SPEC_FULL §6: "schema creation
/// always runs; only the ANN index build is skippable").
pub async fn ensure_schema(
    conn: &mut PgConn,
    dimensions: u32,
    auto_create_extension: bool,
) -> Result<(), DbError> {
    if auto_create_extension {
        diesel::sql_query(CREATE_EXTENSION).execute(conn).await?;
    }

    diesel::sql_query(CREATE_PROJECTS).execute(conn).await?;
    diesel::sql_query(create_documents(dimensions))
        .execute(conn)
        .await?;
    diesel::sql_query(create_document_chunks(dimensions))
        .execute(conn)
        .await?;
    diesel::sql_query(CREATE_PROCESSING_LOGS).execute(conn).await?;

    for statement in CREATE_INDEXES {
        diesel::sql_query(*statement).execute(conn).await?;
    }

    Ok(())
}

/// Build the ANN vector indexes. Skipped when the orchestrator's
/// `--skip-hnsw-indexes` flag is set (spec §6).
pub async fn build_ann_indexes(conn: &mut PgConn) -> Result<(), DbError> {
    for statement in ann_indexes() {
        diesel::sql_query(statement).execute(conn).await?;
    }
    Ok(())
}
