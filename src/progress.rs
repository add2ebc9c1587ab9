//! Periodic summary to stderr (spec §4.1, SPEC_FULL §4.8). Grounded on
//! `cli/commands/scrape.rs`'s `indicatif::ProgressBar` construction and
//! styling, adapted from a single incrementing bar to a 30s-interval line
//! summary since a single document here can take minutes (OCR-bound)
//! rather than seconds (a URL refresh).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

pub const REPORT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct ProgressCounters {
    pub projects_done: AtomicU64,
    pub projects_total: AtomicU64,
    pub documents_admitted: AtomicU64,
    pub documents_completed: AtomicU64,
    pub documents_failed: AtomicU64,
    pub documents_skipped: AtomicU64,
    pub active_workers: AtomicU64,
}

pub struct ProgressReporter {
    counters: Arc<ProgressCounters>,
    started_at: Instant,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(counters: Arc<ProgressCounters>, interactive: bool) -> Self {
        let bar = interactive.then(|| {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        });

        Self {
            counters,
            started_at: Instant::now(),
            bar,
        }
    }

    /// Emit one summary line, both as a structured `tracing::info!` event
    /// (always) and as an `indicatif` line when attached to a terminal.
    pub fn report(&self) {
        let elapsed = self.started_at.elapsed();
        let completed = self.counters.documents_completed.load(Ordering::Relaxed);
        let failed = self.counters.documents_failed.load(Ordering::Relaxed);
        let skipped = self.counters.documents_skipped.load(Ordering::Relaxed);
        let admitted = self.counters.documents_admitted.load(Ordering::Relaxed);
        let active = self.counters.active_workers.load(Ordering::Relaxed);
        let projects_done = self.counters.projects_done.load(Ordering::Relaxed);
        let projects_total = self.counters.projects_total.load(Ordering::Relaxed);

        let per_min = if elapsed.as_secs() > 0 {
            (completed + failed + skipped) as f64 / (elapsed.as_secs() as f64 / 60.0)
        } else {
            0.0
        };

        tracing::info!(
            elapsed_secs = elapsed.as_secs(),
            projects_done,
            projects_total,
            documents_admitted = admitted,
            documents_completed = completed,
            documents_failed = failed,
            documents_skipped = skipped,
            active_workers = active,
            documents_per_min = per_min,
            "progress"
        );

        if let Some(bar) = &self.bar {
            bar.set_message(format!(
                "projects {projects_done}/{projects_total} docs {completed}/{admitted} ({failed} failed, {skipped} skipped) {active} active, {per_min:.1}/min"
            ));
            bar.tick();
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
