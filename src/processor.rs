//! The single-document state machine (spec §4.2):
//! `fetching -> validating -> {extracting | ocr-extracting | skipping | failing}
//! -> chunking -> embedding -> persisting -> logged`.
//!
//! Grounded on the teacher's stage-by-stage `cmd_*` command functions in
//! `cli/commands/scrape.rs` (sequential per-item dispatch), generalized
//! into an explicit state walk that always terminates in exactly one of
//! {success, failure, skipped} (spec §4.7).

use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::chunk::{Chunker, PageText};
use crate::config::Settings;
use crate::embed::{embed_in_micro_batches, Embedder};
use crate::error::{ProcessingStatus, ValidationReason};
use crate::keywords::{extract_keywords_bounded, KeywordExtractor, DEFAULT_MAX_KEYWORDS};
use crate::models::{Chunk, ChunkMetadata, Document, DocumentDescriptor, PdfMetadata};
use crate::object_store::ObjectSource;
use crate::ocr::OcrRouter;
use crate::pdf::extractor::{total_non_whitespace_chars, TextExtractor};
use crate::pdf::inspector::{Classification, PdfInspector};
use crate::repository::DocumentStore;

type Json = serde_json::Value;

pub enum ProcessingOutcome {
    Success { chunks_written: usize },
    Failure { reason: ValidationReason },
    Skipped { reason: ValidationReason },
}

pub struct DocumentProcessor<S, O, E, K> {
    pub object_fetcher: Arc<O>,
    pub ocr_router: Option<Arc<OcrRouter>>,
    pub embedder: Arc<E>,
    pub keyword_extractor: Arc<K>,
    pub store: Arc<S>,
    pub settings: Arc<Settings>,
    pub keyword_threads: usize,
}

impl<S, O, E, K> DocumentProcessor<S, O, E, K>
where
    S: DocumentStore,
    O: ObjectSource,
    E: Embedder,
    K: KeywordExtractor,
{
    /// Run the full state machine for one document and always write
    /// exactly one processing log row (spec §4.7, §3).
    pub async fn process(
        &self,
        descriptor: &DocumentDescriptor,
        cancellation: &CancellationToken,
    ) -> ProcessingOutcome {
        let start = Instant::now();
        let mut metrics = serde_json::Map::new();

        let outcome = self.run(descriptor, cancellation, &mut metrics).await;

        let (status, reason) = match &outcome {
            ProcessingOutcome::Success { chunks_written } => {
                metrics.insert("chunks_written".to_string(), json!(chunks_written));
                (ProcessingStatus::Success, None)
            }
            ProcessingOutcome::Failure { reason } => (ProcessingStatus::Failure, Some(*reason)),
            ProcessingOutcome::Skipped { reason } => (ProcessingStatus::Skipped, Some(*reason)),
        };

        metrics.insert(
            "elapsed_ms".to_string(),
            json!(start.elapsed().as_millis() as u64),
        );
        if let Some(reason) = reason {
            metrics.insert("validation_reason".to_string(), json!(reason.as_str()));
        }

        if let Err(e) = self
            .store
            .insert_log(
                &descriptor.document_id,
                &descriptor.project_id,
                status,
                Json::Object(metrics),
            )
            .await
        {
            tracing::error!(
                document_id = %descriptor.document_id,
                error = %e,
                "failed to write processing log"
            );
        }

        outcome
    }

    async fn run(
        &self,
        descriptor: &DocumentDescriptor,
        cancellation: &CancellationToken,
        metrics: &mut serde_json::Map<String, serde_json::Value>,
    ) -> ProcessingOutcome {
        // --- fetching ---
        let fetch_result = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return ProcessingOutcome::Failure { reason: ValidationReason::Cancelled },
            result = self.object_fetcher.fetch(&descriptor.s3_key) => result,
        };

        let object = match fetch_result {
            Ok(o) => o,
            Err(e) => {
                metrics.insert("fetch_error".to_string(), json!(e.to_string()));
                return ProcessingOutcome::Failure {
                    reason: ValidationReason::FetchError,
                };
            }
        };

        // --- validating ---
        if !PdfInspector::is_pdf(&object.bytes) {
            let known_fields = PdfMetadata {
                file_size: object.size,
                ..Default::default()
            };
            self.persist_metadata_only(descriptor, Some(&known_fields))
                .await;
            return ProcessingOutcome::Skipped {
                reason: ValidationReason::PrecheckFailed,
            };
        }

        let mut temp_file = match NamedTempFile::new() {
            Ok(f) => f,
            Err(_) => {
                return ProcessingOutcome::Failure {
                    reason: ValidationReason::UnexpectedError,
                }
            }
        };
        if temp_file.write_all(&object.bytes).is_err() {
            return ProcessingOutcome::Failure {
                reason: ValidationReason::UnexpectedError,
            };
        }
        let temp_path = temp_file.path().to_path_buf();

        let inspection = {
            let path = temp_path.clone();
            let size = object.size;
            tokio::task::spawn_blocking(move || PdfInspector::inspect(&path, size))
                .await
                .unwrap_or_else(|_| {
                    Err(crate::pdf::inspector::PdfInspectorError::Corrupt(
                        "inspector task panicked".to_string(),
                    ))
                })
        };

        let (classification, pdf_metadata) = match inspection {
            Ok(pair) => pair,
            Err(_) => {
                return ProcessingOutcome::Failure {
                    reason: ValidationReason::PdfParseError,
                }
            }
        };

        self.persist_metadata_only(descriptor, Some(&pdf_metadata))
            .await;

        let ocr_enabled = self.settings.ocr_enabled
            && self
                .ocr_router
                .as_ref()
                .map(|r| r.is_available())
                .unwrap_or(false);

        let page_count = pdf_metadata.page_count.unwrap_or(1).max(1);

        let (extractable_pages, mut extraction_method) = match classification {
            Classification::ScannedDevice => {
                if !ocr_enabled {
                    return ProcessingOutcome::Skipped {
                        reason: ValidationReason::ScannedOrImagePdf,
                    };
                }
                (None, "ocr".to_string())
            }
            Classification::NoText => {
                if !ocr_enabled {
                    return ProcessingOutcome::Skipped {
                        reason: ValidationReason::ScannedOrImagePdf,
                    };
                }
                (None, "ocr".to_string())
            }
            Classification::Extractable => {
                let extractor = TextExtractor::new(&self.settings.ocr_language);
                let path = temp_path.clone();
                let pages = tokio::task::spawn_blocking(move || {
                    extractor.extract_pages(&path, page_count)
                })
                .await
                .ok()
                .and_then(|r| r.ok());

                match pages {
                    Some(pages) if total_non_whitespace_chars(&pages) > 0 => {
                        (Some(pages), "standard_pdf".to_string())
                    }
                    _ if ocr_enabled => (None, "ocr".to_string()),
                    _ => {
                        return ProcessingOutcome::Failure {
                            reason: ValidationReason::EmptyText,
                        }
                    }
                }
            }
        };

        // --- extracting | ocr-extracting ---
        let pages: Vec<PageText> = if let Some(pages) = extractable_pages {
            pages
                .into_iter()
                .map(|p| PageText {
                    page_number: p.page_number,
                    text: p.text,
                })
                .collect()
        } else {
            // ocr-extracting
            let router = match &self.ocr_router {
                Some(r) => Arc::clone(r),
                None => {
                    return ProcessingOutcome::Failure {
                        reason: ValidationReason::OcrFailed,
                    }
                }
            };

            let had_extractable_fallback = classification == Classification::ScannedDevice;

            // One dispatch for the whole document (spec §3 per-chunk page
            // attribution depends on each page's OCR text actually being
            // that page's text -- `OcrRouter::ocr_pdf_pages` is what lets a
            // whole-document backend like Azure analyze once and split by
            // page instead of being asked once per page).
            let ocr_result = {
                let router = Arc::clone(&router);
                let path = temp_path.clone();
                tokio::task::spawn_blocking(move || router.ocr_pdf_pages(&path, page_count)).await
            };

            let ocr_pages: Vec<PageText> = match &ocr_result {
                Ok(Ok(results)) => results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| PageText {
                        page_number: i as u32 + 1,
                        text: r.text.clone(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            let ocr_error = !matches!(ocr_result, Ok(Ok(_)));

            if ocr_error || ocr_pages.iter().all(|p| p.text.trim().is_empty()) {
                // Open Question resolution: fall back to extractable text
                // only when this document was routed to OCR purely as a
                // quality enhancement on an already-extractable document.
                if had_extractable_fallback {
                    let extractor = TextExtractor::new(&self.settings.ocr_language);
                    let path = temp_path.clone();
                    match tokio::task::spawn_blocking(move || {
                        extractor.extract_pages(&path, page_count)
                    })
                    .await
                    {
                        Ok(Ok(pages)) if total_non_whitespace_chars(&pages) > 0 => {
                            extraction_method = "standard_pdf".to_string();
                            pages
                                .into_iter()
                                .map(|p| PageText {
                                    page_number: p.page_number,
                                    text: p.text,
                                })
                                .collect()
                        }
                        _ => {
                            return ProcessingOutcome::Failure {
                                reason: ValidationReason::OcrFailed,
                            }
                        }
                    }
                } else {
                    return ProcessingOutcome::Failure {
                        reason: ValidationReason::OcrFailed,
                    };
                }
            } else {
                extraction_method = format!("ocr_{}", self.settings.ocr_provider_label());
                ocr_pages
            }
        };

        // --- chunking ---
        let chunker = Chunker::new(self.settings.chunk_size, self.settings.chunk_overlap);
        let text_chunks = chunker.chunk(&pages);
        if text_chunks.is_empty() {
            return ProcessingOutcome::Failure {
                reason: ValidationReason::EmptyAfterChunking,
            };
        }

        if cancellation.is_cancelled() {
            return ProcessingOutcome::Failure {
                reason: ValidationReason::Cancelled,
            };
        }

        // --- embedding ---
        let texts: Vec<String> = text_chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = match embed_in_micro_batches(self.embedder.as_ref(), &texts, 32) {
            Ok(v) => v,
            Err(_) => {
                return ProcessingOutcome::Failure {
                    reason: ValidationReason::EmbeddingFailed,
                }
            }
        };

        // --- persisting (keyword extraction + writes) ---
        let keyword_lists = extract_keywords_bounded(
            Arc::clone(&self.keyword_extractor),
            texts.clone(),
            self.keyword_threads,
            DEFAULT_MAX_KEYWORDS,
        )
        .await;

        let chunks: Vec<Chunk> = text_chunks
            .iter()
            .zip(embeddings.into_iter())
            .enumerate()
            .map(|(i, (tc, embedding))| Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: descriptor.document_id.clone(),
                project_id: descriptor.project_id.clone(),
                page_number: tc.page_number,
                content: tc.content.clone(),
                embedding,
                metadata: ChunkMetadata {
                    document_name: descriptor.name.clone(),
                    extraction_method: extraction_method.clone(),
                    document_metadata: pdf_metadata.clone(),
                    s3_key: descriptor.s3_key.clone(),
                },
            })
            .collect();

        let all_keywords: Vec<String> = keyword_lists.into_iter().flatten().collect();

        let document = Document {
            document_id: descriptor.document_id.clone(),
            project_id: descriptor.project_id.clone(),
            document_keywords: all_keywords,
            document_tags: Vec::new(),
            document_headings: Vec::new(),
            document_metadata: serde_json::to_value(&pdf_metadata).unwrap_or(serde_json::Value::Null),
            embedding: Some(mean_pool_normalized(&chunks)),
            created_at: chrono::Utc::now(),
        };

        if let Err(e) = self.store.upsert_document(&document).await {
            tracing::error!(document_id = %descriptor.document_id, error = %e, "document upsert failed");
            return ProcessingOutcome::Failure {
                reason: ValidationReason::DbWriteFailed,
            };
        }

        match self.store.replace_chunks(&descriptor.document_id, &chunks).await {
            Ok(db_retries) => {
                metrics.insert("db_retries".to_string(), json!(db_retries));
            }
            Err(e) => {
                tracing::error!(document_id = %descriptor.document_id, error = %e, "chunk batch insert failed");
                return ProcessingOutcome::Failure {
                    reason: ValidationReason::DbWriteFailed,
                };
            }
        }

        ProcessingOutcome::Success {
            chunks_written: chunks.len(),
        }
    }

    async fn persist_metadata_only(&self, descriptor: &DocumentDescriptor, metadata: Option<&PdfMetadata>) {
        let document_metadata = match metadata {
            Some(m) => {
                let mut value = serde_json::to_value(m).unwrap_or(serde_json::Value::Null);
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert("name".to_string(), json!(descriptor.name));
                }
                value
            }
            None => json!({ "name": descriptor.name }),
        };

        let document = Document {
            document_id: descriptor.document_id.clone(),
            project_id: descriptor.project_id.clone(),
            document_keywords: Vec::new(),
            document_tags: Vec::new(),
            document_headings: Vec::new(),
            document_metadata,
            embedding: None,
            created_at: chrono::Utc::now(),
        };
        let _ = self.store.upsert_document(&document).await;
    }
}

/// Document-level embedding: the mean of its chunks' vectors, L2-normalized,
/// giving the `documents.embedding` column (spec §6 schema) a representative
/// vector for document-level semantic search alongside chunk-level retrieval.
/// Open Question resolution (not named in spec §9, but the schema requires
/// a value): mean-pool over chunks rather than a separate whole-document
/// embedding call, since the chunks already cover the full extracted text
/// and a second embedding pass over raw concatenated text would double the
/// per-document embedding cost for no additional signal.
fn mean_pool_normalized(chunks: &[Chunk]) -> Vec<f32> {
    let dim = chunks.first().map(|c| c.embedding.len()).unwrap_or(0);
    let mut sum = vec![0.0f32; dim];
    for chunk in chunks {
        for (s, v) in sum.iter_mut().zip(chunk.embedding.iter()) {
            *s += v;
        }
    }
    let n = chunks.len().max(1) as f32;
    for s in &mut sum {
        *s /= n;
    }
    let norm: f32 = sum.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for s in &mut sum {
            *s /= norm;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: "c".to_string(),
            document_id: "d".to_string(),
            project_id: "p".to_string(),
            page_number: 1,
            content: "text".to_string(),
            embedding,
            metadata: ChunkMetadata {
                document_name: "d.pdf".to_string(),
                extraction_method: "standard_pdf".to_string(),
                document_metadata: PdfMetadata::default(),
                s3_key: "d.pdf".to_string(),
            },
        }
    }

    #[test]
    fn mean_pool_is_unit_normalized() {
        let chunks = vec![
            chunk_with(vec![1.0, 0.0, 0.0]),
            chunk_with(vec![0.0, 1.0, 0.0]),
        ];
        let pooled = mean_pool_normalized(&chunks);
        let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((pooled[0] - pooled[1]).abs() < 1e-6);
    }

    #[test]
    fn mean_pool_empty_chunks_is_empty_vector() {
        assert!(mean_pool_normalized(&[]).is_empty());
    }
}

impl Settings {
    fn ocr_provider_label(&self) -> &'static str {
        match self.ocr_provider {
            crate::config::OcrProvider::Tesseract => "tesseract",
            crate::config::OcrProvider::Azure => "azure",
        }
    }
}
