//! Integration test for `Orchestrator`'s retry-mode admission logic
//! (spec §4.1), driven through in-memory fakes for `MetadataSource`,
//! `DocumentStore` and `ObjectSource` rather than a live Postgres/HTTP/S3
//! stack (SPEC_FULL §8: "integration tests for orchestrator
//! admission-by-retry-mode logic using an in-memory fake
//! `PersistenceStore`/`MetadataClient`").
//!
//! The fake object source always fails the fetch, so every admitted
//! document resolves quickly to a single `failure`/`fetch_error` log row
//! without touching any external tool (pdfinfo/pdftotext/tesseract) --
//! what's under test here is *which* documents get a log row appended at
//! all, not the downstream extraction pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use docvec_ingest::config::{ConcurrencyMode, OcrProvider, Settings};
use docvec_ingest::embed::HashEmbedder;
use docvec_ingest::error::{ProcessingStatus, RetryMode};
use docvec_ingest::keywords::FrequencyKeywordExtractor;
use docvec_ingest::metadata_client::{MetadataClientError, MetadataSource};
use docvec_ingest::models::{Chunk, Document, DocumentDescriptor, Project};
use docvec_ingest::object_store::{FetchedObject, ObjectSource, ObjectStoreError};
use docvec_ingest::orchestrator::{InvocationConfig, Orchestrator};
use docvec_ingest::repository::{DocumentStore, StoreError};

struct FakeMetadataSource {
    project_id: String,
    documents: Vec<DocumentDescriptor>,
}

#[async_trait]
impl MetadataSource for FakeMetadataSource {
    async fn list_projects(&self) -> Result<Vec<Project>, MetadataClientError> {
        Ok(vec![Project {
            project_id: self.project_id.clone(),
            project_name: "test project".to_string(),
            metadata: None,
        }])
    }

    async fn list_documents(
        &self,
        project_id: &str,
    ) -> Result<Vec<DocumentDescriptor>, MetadataClientError> {
        if project_id == self.project_id {
            Ok(self.documents.clone())
        } else {
            Ok(Vec::new())
        }
    }
}

struct FakeObjectSource;

#[async_trait]
impl ObjectSource for FakeObjectSource {
    async fn fetch(&self, _key: &str) -> Result<FetchedObject, ObjectStoreError> {
        Err(ObjectStoreError::Config("no object store in test".to_string()))
    }
}

#[derive(Default)]
struct FakeDocumentStore {
    logs: Mutex<HashMap<String, Vec<(ProcessingStatus, serde_json::Value)>>>,
}

impl FakeDocumentStore {
    fn seeded(seed: &[(&str, ProcessingStatus)]) -> Self {
        let mut logs = HashMap::new();
        for (document_id, status) in seed {
            logs.insert(
                document_id.to_string(),
                vec![(*status, serde_json::json!({"seed": true}))],
            );
        }
        Self {
            logs: Mutex::new(logs),
        }
    }

    async fn entries_for(&self, document_id: &str) -> Vec<(ProcessingStatus, serde_json::Value)> {
        self.logs
            .lock()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn build_ann_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_project(&self, _project: &Project) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_document(&self, _document: &Document) -> Result<(), StoreError> {
        Ok(())
    }

    async fn replace_chunks(&self, _document_id: &str, _chunks: &[Chunk]) -> Result<u32, StoreError> {
        Ok(0)
    }

    async fn insert_log(
        &self,
        document_id: &str,
        _project_id: &str,
        status: ProcessingStatus,
        metrics: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.logs
            .lock()
            .await
            .entry(document_id.to_string())
            .or_default()
            .push((status, metrics));
        Ok(())
    }

    async fn most_recent_log_status(
        &self,
        document_id: &str,
    ) -> Result<Option<ProcessingStatus>, StoreError> {
        Ok(self
            .logs
            .lock()
            .await
            .get(document_id)
            .and_then(|entries| entries.last())
            .map(|(status, _)| *status))
    }

    async fn select_retry_candidates(
        &self,
        mode: RetryMode,
        _project_id: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let logs = self.logs.lock().await;
        Ok(logs
            .iter()
            .filter_map(|(document_id, entries)| {
                let (status, _) = entries.last()?;
                mode.matches(*status).then(|| document_id.clone())
            })
            .collect())
    }
}

fn test_settings() -> Settings {
    Settings {
        document_search_url: "http://unused.invalid".to_string(),
        s3_endpoint_uri: "http://unused.invalid".to_string(),
        s3_bucket_name: "unused".to_string(),
        s3_access_key_id: "unused".to_string(),
        s3_secret_access_key: "unused".to_string(),
        s3_region: "unused".to_string(),
        vector_db_url: "postgres://unused".to_string(),
        logs_database_url: "postgres://unused".to_string(),
        embedding_dimensions: 8,
        embedding_model_name: "test-model".to_string(),
        keyword_model_name: "test-model".to_string(),
        chunk_size: 1000,
        chunk_overlap: 200,
        chunk_insert_batch_size: 25,
        files_concurrency_size: ConcurrencyMode::Fixed(2),
        keyword_extraction_workers: ConcurrencyMode::Fixed(2),
        auto_create_pgvector_extension: false,
        get_project_page: 1,
        get_docs_page: 1000,
        ocr_enabled: false,
        ocr_provider: OcrProvider::Tesseract,
        ocr_dpi: 300,
        ocr_language: "eng".to_string(),
    }
}

fn descriptor(document_id: &str, project_id: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        document_id: document_id.to_string(),
        project_id: project_id.to_string(),
        name: format!("{document_id}.pdf"),
        s3_key: format!("{document_id}.pdf"),
    }
}

async fn run_with(
    store: Arc<FakeDocumentStore>,
    retry_mode: RetryMode,
) -> Arc<FakeDocumentStore> {
    let project_id = "proj-1".to_string();
    let documents = vec![
        descriptor("doc-new", &project_id),
        descriptor("doc-failed", &project_id),
        descriptor("doc-skipped", &project_id),
        descriptor("doc-success", &project_id),
    ];

    let metadata = Arc::new(FakeMetadataSource {
        project_id: project_id.clone(),
        documents,
    });
    let object_fetcher = Arc::new(FakeObjectSource);
    let settings = Arc::new(test_settings());
    let embedder = Arc::new(HashEmbedder::new(settings.embedding_dimensions));
    let keyword_extractor = Arc::new(FrequencyKeywordExtractor);

    let orchestrator = Orchestrator::new(
        metadata,
        Arc::clone(&store),
        object_fetcher,
        None,
        embedder,
        keyword_extractor,
        settings,
    );

    let config = InvocationConfig {
        project_ids: Vec::new(),
        retry_mode,
        shallow: None,
        timed_minutes: None,
        skip_hnsw_indexes: true,
        worker_count_override: Some(2),
    };

    orchestrator.run(config).await.expect("orchestrator run");
    store
}

#[tokio::test]
async fn default_mode_admits_new_and_failed_but_skips_success() {
    let store = Arc::new(FakeDocumentStore::seeded(&[
        ("doc-failed", ProcessingStatus::Failure),
        ("doc-skipped", ProcessingStatus::Skipped),
        ("doc-success", ProcessingStatus::Success),
    ]));

    let store = run_with(store, RetryMode::None).await;

    // Never-processed and previously-failed/skipped documents are admitted
    // and get exactly one new log row appended.
    assert_eq!(store.entries_for("doc-new").await.len(), 1);
    assert_eq!(store.entries_for("doc-failed").await.len(), 2);
    assert_eq!(store.entries_for("doc-skipped").await.len(), 2);

    // A document whose latest log is already success is never re-admitted.
    assert_eq!(store.entries_for("doc-success").await.len(), 1);

    // Every newly-appended entry for an admitted document reflects the
    // fake object source's failure, not a stale/duplicated prior status.
    let (status, metrics) = store.entries_for("doc-new").await[0].clone();
    assert_eq!(status, ProcessingStatus::Failure);
    assert_eq!(
        metrics.get("validation_reason").and_then(|v| v.as_str()),
        Some("fetch_error")
    );
}

#[tokio::test]
async fn retry_failed_only_admits_documents_whose_last_log_is_failure() {
    let store = Arc::new(FakeDocumentStore::seeded(&[
        ("doc-failed", ProcessingStatus::Failure),
        ("doc-skipped", ProcessingStatus::Skipped),
        ("doc-success", ProcessingStatus::Success),
    ]));

    let store = run_with(store, RetryMode::FailedOnly).await;

    // A document with no prior log at all is not an admission candidate
    // under a targeted retry run -- only `doc-failed` is re-processed.
    assert_eq!(store.entries_for("doc-new").await.len(), 0);
    assert_eq!(store.entries_for("doc-failed").await.len(), 2);
    assert_eq!(store.entries_for("doc-skipped").await.len(), 1);
    assert_eq!(store.entries_for("doc-success").await.len(), 1);
}

#[tokio::test]
async fn retry_skipped_only_admits_documents_whose_last_log_is_skipped() {
    let store = Arc::new(FakeDocumentStore::seeded(&[
        ("doc-failed", ProcessingStatus::Failure),
        ("doc-skipped", ProcessingStatus::Skipped),
        ("doc-success", ProcessingStatus::Success),
    ]));

    let store = run_with(store, RetryMode::SkippedOnly).await;

    assert_eq!(store.entries_for("doc-new").await.len(), 0);
    assert_eq!(store.entries_for("doc-failed").await.len(), 1);
    assert_eq!(store.entries_for("doc-skipped").await.len(), 2);
    assert_eq!(store.entries_for("doc-success").await.len(), 1);
}

#[tokio::test]
async fn shallow_cap_limits_admitted_documents_per_project() {
    let store = Arc::new(FakeDocumentStore::default());
    let project_id = "proj-1".to_string();
    let documents: Vec<DocumentDescriptor> = (0..5)
        .map(|i| descriptor(&format!("doc-{i}"), &project_id))
        .collect();

    let metadata = Arc::new(FakeMetadataSource {
        project_id: project_id.clone(),
        documents,
    });
    let object_fetcher = Arc::new(FakeObjectSource);
    let settings = Arc::new(test_settings());
    let embedder = Arc::new(HashEmbedder::new(settings.embedding_dimensions));
    let keyword_extractor = Arc::new(FrequencyKeywordExtractor);

    let orchestrator = Orchestrator::new(
        metadata,
        Arc::clone(&store),
        object_fetcher,
        None,
        embedder,
        keyword_extractor,
        settings,
    );

    let config = InvocationConfig {
        project_ids: Vec::new(),
        retry_mode: RetryMode::None,
        shallow: Some(2),
        timed_minutes: None,
        skip_hnsw_indexes: true,
        worker_count_override: Some(2),
    };

    orchestrator.run(config).await.expect("orchestrator run");

    let logs = store.logs.lock().await;
    let processed = logs.values().filter(|entries| !entries.is_empty()).count();
    assert_eq!(processed, 2, "shallow cap must admit at most N documents per project");
}
