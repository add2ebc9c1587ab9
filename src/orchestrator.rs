//! Project/document discovery, work queuing, worker-pool management,
//! budgets, graceful shutdown, progress reporting (spec §4.1).
//!
//! The worker pool is grounded directly on
//! `cli/commands/scrape.rs::cmd_refresh`: an `Arc<Mutex<Vec<_>>>` work
//! queue, an `Arc<Semaphore>` bounding concurrency, N `tokio::spawn`
//! workers each looping acquire-permit -> pop-from-queue -> process ->
//! continue-until-empty. Cancellation generalizes the teacher's
//! `tokio::sync::watch` done-signal (`foia::work_queue::runner`) into a
//! `tokio_util::sync::CancellationToken` checked at every suspension point.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant as TokioInstant;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::embed::Embedder;
use crate::error::{ProcessingStatus, RetryMode, ValidationReason};
use crate::keywords::KeywordExtractor;
use crate::metadata_client::{MetadataClientError, MetadataSource};
use crate::models::{DocumentDescriptor, Project};
use crate::object_store::ObjectSource;
use crate::ocr::OcrRouter;
use crate::processor::DocumentProcessor;
use crate::progress::{ProgressCounters, ProgressReporter, REPORT_INTERVAL};
use crate::repository::DocumentStore;

/// Drain timeout for in-flight documents on shutdown/budget expiry
/// (spec §5).
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default)]
pub struct InvocationConfig {
    pub project_ids: Vec<String>,
    pub retry_mode: RetryMode,
    pub shallow: Option<usize>,
    pub timed_minutes: Option<u64>,
    pub skip_hnsw_indexes: bool,
    pub worker_count_override: Option<usize>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub documents_completed: u64,
    pub documents_failed: u64,
    pub documents_skipped: u64,
}

struct WorkItem {
    project_id: String,
    descriptor: DocumentDescriptor,
}

pub struct Orchestrator<M, S, O, E, K> {
    metadata_client: Arc<M>,
    store: Arc<S>,
    object_fetcher: Arc<O>,
    ocr_router: Option<Arc<OcrRouter>>,
    embedder: Arc<E>,
    keyword_extractor: Arc<K>,
    settings: Arc<Settings>,
}

impl<M, S, O, E, K> Orchestrator<M, S, O, E, K>
where
    M: MetadataSource + 'static,
    S: DocumentStore + 'static,
    O: ObjectSource + 'static,
    E: Embedder + 'static,
    K: KeywordExtractor + 'static,
{
    pub fn new(
        metadata_client: Arc<M>,
        store: Arc<S>,
        object_fetcher: Arc<O>,
        ocr_router: Option<Arc<OcrRouter>>,
        embedder: Arc<E>,
        keyword_extractor: Arc<K>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            metadata_client,
            store,
            object_fetcher,
            ocr_router,
            embedder,
            keyword_extractor,
            settings,
        }
    }

    /// Discover projects/documents, admit by retry mode, dispatch to a
    /// bounded worker pool, report progress every 30s, honor the wall-clock
    /// budget and graceful shutdown, and return a summary. Returns an error
    /// only for fatal orchestrator-level failures (spec §4.1: "On fatal
    /// orchestrator-level error ... returns non-zero without touching the
    /// pool").
    pub async fn run(&self, config: InvocationConfig) -> Result<RunSummary, MetadataClientError> {
        if !config.skip_hnsw_indexes {
            if let Err(e) = self.store.build_ann_indexes().await {
                tracing::warn!(error = %e, "ANN index build failed, continuing without it");
            }
        }

        let projects = self.metadata_client.list_projects().await?;
        let projects: Vec<Project> = if config.project_ids.is_empty() {
            projects
        } else {
            projects
                .into_iter()
                .filter(|p| config.project_ids.contains(&p.project_id))
                .collect()
        };

        for project in &projects {
            let _ = self.store.upsert_project(project).await;
        }

        let counters = Arc::new(ProgressCounters::default());
        counters
            .projects_total
            .store(projects.len() as u64, Ordering::Relaxed);

        let mut queue = Vec::new();
        for project in &projects {
            let documents = match self.metadata_client.list_documents(&project.project_id).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(project_id = %project.project_id, error = %e, "failed to list documents");
                    continue;
                }
            };

            let mut admitted_for_project = 0usize;
            for descriptor in documents {
                if let Some(cap) = config.shallow {
                    if admitted_for_project >= cap {
                        break;
                    }
                }

                let current_status = self
                    .store
                    .most_recent_log_status(&descriptor.document_id)
                    .await
                    .unwrap_or(None);

                // A document with no prior log has never been processed;
                // that's only an admission candidate under the default
                // (non-retry) policy. `--retry-failed`/`--retry-skipped`
                // are a targeted re-run over documents with that exact
                // prior outcome, not a general ingest pass (spec §4.1).
                let admit = match (current_status, config.retry_mode) {
                    (None, RetryMode::None) => true,
                    (None, _) => false,
                    (Some(status), mode) => mode.matches(status),
                };

                if admit {
                    admitted_for_project += 1;
                    queue.push(WorkItem {
                        project_id: project.project_id.clone(),
                        descriptor,
                    });
                }
            }

            counters.projects_done.fetch_add(1, Ordering::Relaxed);
        }

        counters
            .documents_admitted
            .store(queue.len() as u64, Ordering::Relaxed);

        let worker_count = config
            .worker_count_override
            .unwrap_or_else(|| self.settings.resolved_worker_count());
        let keyword_threads = self.settings.resolved_keyword_threads();

        let cancellation = CancellationToken::new();
        let budget_deadline = config
            .timed_minutes
            .map(|m| TokioInstant::now() + Duration::from_secs(m * 60));

        let work_queue = Arc::new(Mutex::new(queue));
        let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
        let reporter = Arc::new(ProgressReporter::new(Arc::clone(&counters), atty_is_terminal()));

        let report_handle = {
            let reporter = Arc::clone(&reporter);
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(REPORT_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => reporter.report(),
                        _ = cancellation.cancelled() => break,
                    }
                }
            })
        };

        let shutdown_handle = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                tracing::warn!("shutdown signal received, draining in-flight documents");
                cancellation.cancel();
            })
        };

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count.max(1) {
            let work_queue = Arc::clone(&work_queue);
            let semaphore = Arc::clone(&semaphore);
            let cancellation = cancellation.clone();
            let counters = Arc::clone(&counters);
            let store = Arc::clone(&self.store);
            let object_fetcher = Arc::clone(&self.object_fetcher);
            let ocr_router = self.ocr_router.clone();
            let embedder = Arc::clone(&self.embedder);
            let keyword_extractor = Arc::clone(&self.keyword_extractor);
            let settings = Arc::clone(&self.settings);

            handles.push(tokio::spawn(async move {
                let processor = Arc::new(DocumentProcessor {
                    object_fetcher,
                    ocr_router,
                    embedder,
                    keyword_extractor,
                    store: Arc::clone(&store),
                    settings,
                    keyword_threads,
                });

                loop {
                    if cancellation.is_cancelled() {
                        break;
                    }
                    if let Some(deadline) = budget_deadline {
                        if TokioInstant::now() >= deadline {
                            break;
                        }
                    }

                    let _permit = semaphore.acquire().await.expect("semaphore open");

                    let item = {
                        let mut queue = work_queue.lock().await;
                        queue.pop()
                    };

                    let item = match item {
                        Some(item) => item,
                        None => break,
                    };

                    counters.active_workers.fetch_add(1, Ordering::Relaxed);

                    let processor = Arc::clone(&processor);
                    let cancellation_for_task = cancellation.clone();
                    let descriptor = item.descriptor.clone();
                    let project_id = item.project_id.clone();
                    let store_for_panic = Arc::clone(&store);

                    let result = tokio::spawn(async move {
                        processor.process(&descriptor, &cancellation_for_task).await
                    })
                    .await;

                    counters.active_workers.fetch_sub(1, Ordering::Relaxed);

                    match result {
                        Ok(crate::processor::ProcessingOutcome::Success { .. }) => {
                            counters.documents_completed.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(crate::processor::ProcessingOutcome::Skipped { .. }) => {
                            counters.documents_skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(crate::processor::ProcessingOutcome::Failure { .. }) => {
                            counters.documents_failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_join_error) => {
                            // Panic isolation (spec §4.1): a panicking
                            // document's own task never reached the log
                            // write inside DocumentProcessor::process, so
                            // the orchestrator writes it here instead.
                            counters.documents_failed.fetch_add(1, Ordering::Relaxed);
                            let _ = store_for_panic
                                .insert_log(
                                    &item.descriptor.document_id,
                                    &project_id,
                                    ProcessingStatus::Failure,
                                    json!({ "validation_reason": ValidationReason::UnexpectedError.as_str() }),
                                )
                                .await;
                        }
                    }
                }
            }));
        }

        // Let in-flight work finish, bounded by the drain timeout once
        // cancellation fires (spec §4.1, §5).
        let drain = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        let cancelled_then_wait = async {
            cancellation.cancelled().await;
            tokio::time::sleep(DRAIN_TIMEOUT).await;
        };

        tokio::select! {
            _ = drain => {}
            _ = cancelled_then_wait => {
                tracing::warn!("drain timeout exceeded, abandoning remaining in-flight documents");
            }
        }

        cancellation.cancel();
        report_handle.abort();
        shutdown_handle.abort();
        reporter.report();
        reporter.finish();

        Ok(RunSummary {
            documents_completed: counters.documents_completed.load(Ordering::Relaxed),
            documents_failed: counters.documents_failed.load(Ordering::Relaxed),
            documents_skipped: counters.documents_skipped.load(Ordering::Relaxed),
        })
    }
}

fn atty_is_terminal() -> bool {
    console::Term::stderr().is_term()
}
