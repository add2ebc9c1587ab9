//! CLI surface (spec §6). `clap` derive parser, grounded on the teacher's
//! `cli` module's derive-based argument style, restricted to exactly the
//! arguments spec §6 enumerates.

use clap::Parser;

use crate::error::RetryMode;
use crate::orchestrator::InvocationConfig;

#[derive(Debug, Parser)]
#[command(name = "docvec-ingest", about = "Document embedding ingestion pipeline")]
pub struct Cli {
    /// Restrict to these projects; absent = all.
    #[arg(long = "project_id")]
    pub project_id: Vec<String>,

    /// Admit only documents whose last log is failure.
    #[arg(long, conflicts_with = "retry_skipped")]
    pub retry_failed: bool,

    /// Admit only documents whose last log is skipped.
    #[arg(long, conflicts_with = "retry_failed")]
    pub retry_skipped: bool,

    /// At most N documents per project.
    #[arg(long)]
    pub shallow: Option<usize>,

    /// Wall-clock budget in minutes.
    #[arg(long)]
    pub timed: Option<u64>,

    /// Do not build the ANN index on the chunk vector column.
    #[arg(long)]
    pub skip_hnsw_indexes: bool,
}

impl Cli {
    pub fn retry_mode(&self) -> RetryMode {
        if self.retry_failed {
            RetryMode::FailedOnly
        } else if self.retry_skipped {
            RetryMode::SkippedOnly
        } else {
            RetryMode::None
        }
    }

    pub fn into_invocation_config(self) -> InvocationConfig {
        InvocationConfig {
            project_ids: self.project_id.clone(),
            retry_mode: self.retry_mode(),
            shallow: self.shallow,
            timed_minutes: self.timed,
            skip_hnsw_indexes: self.skip_hnsw_indexes,
            worker_count_override: None,
        }
    }
}
