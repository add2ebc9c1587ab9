//! Plain domain structs, one per persisted concept (spec §3), following
//! `foiacquire::repository::diesel_models`'s one-struct-per-table convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ProcessingStatus;

/// Producer/creator/page-count metadata captured by `PdfInspector`, embedded
/// both in `documents.document_metadata` and in every chunk's metadata
/// snapshot (spec §3, SPEC_FULL §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PdfMetadata {
    pub producer: Option<String>,
    pub creator: Option<String>,
    pub page_count: Option<u32>,
    pub file_size: u64,
    pub pdf_version: Option<String>,
}

impl PdfMetadata {
    /// Case-insensitive substring match against the built-in
    /// scanning-device signature list (spec §4.2).
    pub fn matches_scanning_device(&self) -> bool {
        const SIGNATURES: &[&str] = &[
            "hp digital sending",
            "ricoh",
            "xerox",
            "canon",
            "epson",
            "scanner",
            "scan",
        ];
        let haystack = format!(
            "{} {}",
            self.producer.as_deref().unwrap_or(""),
            self.creator.as_deref().unwrap_or("")
        )
        .to_lowercase();
        SIGNATURES.iter().any(|sig| haystack.contains(sig))
    }
}

/// A project, created lazily on first sighting, never mutated thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub metadata: Option<Json>,
}

/// A document descriptor as returned by `MetadataClient`, before
/// inspection/extraction has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub project_id: String,
    pub name: String,
    pub s3_key: String,
}

/// The persisted document row (spec §3). Never updated in place; a
/// successful reprocess replaces its chunk set under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub project_id: String,
    pub document_keywords: Vec<String>,
    pub document_tags: Vec<String>,
    pub document_headings: Vec<String>,
    pub document_metadata: Json,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// A unit of extracted, embedded text (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub project_id: String,
    pub page_number: u32,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Structured per-chunk metadata (spec §3: "document name, extraction
/// method, document-metadata snapshot, object-store key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_name: String,
    pub extraction_method: String,
    pub document_metadata: PdfMetadata,
    pub s3_key: String,
}

/// Append-only processing attempt record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub id: Option<i64>,
    pub document_id: String,
    pub project_id: String,
    pub status: String,
    pub validation_reason: Option<String>,
    pub processed_at: DateTime<Utc>,
    pub metrics: Json,
}

impl ProcessingLog {
    pub fn status(&self) -> Option<ProcessingStatus> {
        ProcessingStatus::parse(&self.status)
    }
}
