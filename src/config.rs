//! Environment-driven settings, assembled once at startup and passed by
//! value down through `Orchestrator -> DocumentProcessor -> components`
//! (spec §9: "no ambient configuration singleton").
//!
//! Grounded on `foiacquire::config::Settings`'s fail-fast env validation,
//! with the teacher's file-config/DB-snapshot layering (`prefer`,
//! `prefer_db`, `Config::load()`) dropped entirely: spec §6 defines a pure
//! environment-variable surface.

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Worker-count / keyword-thread-count tiering (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    Auto,
    AutoFull,
    AutoConservative,
    AutoAggressive,
    Fixed(usize),
}

impl FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ConcurrencyMode::Auto),
            "auto-full" => Ok(ConcurrencyMode::AutoFull),
            "auto-conservative" => Ok(ConcurrencyMode::AutoConservative),
            "auto-aggressive" => Ok(ConcurrencyMode::AutoAggressive),
            other => other
                .parse::<usize>()
                .map(ConcurrencyMode::Fixed)
                .map_err(|_| format!("not an integer or known tier: {other}")),
        }
    }
}

impl ConcurrencyMode {
    /// Resolve worker count W from detected CPU count C (spec §5).
    pub fn resolve_workers(&self, cpus: usize) -> usize {
        match self {
            ConcurrencyMode::Auto => {
                if cpus >= 16 {
                    (cpus / 2).max(1)
                } else {
                    cpus.max(1)
                }
            }
            ConcurrencyMode::AutoFull => cpus.max(1),
            ConcurrencyMode::AutoConservative => (cpus / 4).max(1),
            ConcurrencyMode::AutoAggressive => cpus.max(1),
            ConcurrencyMode::Fixed(n) => (*n).max(1),
        }
    }

    /// Resolve per-document keyword-extraction thread count T (spec §5).
    pub fn resolve_keyword_threads(&self, cpus: usize) -> usize {
        match self {
            ConcurrencyMode::Auto => {
                if cpus >= 16 {
                    2
                } else if cpus >= 8 {
                    3
                } else {
                    4
                }
            }
            ConcurrencyMode::AutoAggressive => 4,
            ConcurrencyMode::AutoConservative => 1,
            ConcurrencyMode::AutoFull => 4,
            ConcurrencyMode::Fixed(n) => (*n).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrProvider {
    Tesseract,
    Azure,
}

impl FromStr for OcrProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tesseract" => Ok(OcrProvider::Tesseract),
            "azure" => Ok(OcrProvider::Azure),
            other => Err(format!("unknown OCR_PROVIDER {other:?}")),
        }
    }
}

impl fmt::Display for OcrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrProvider::Tesseract => write!(f, "tesseract"),
            OcrProvider::Azure => write!(f, "azure"),
        }
    }
}

/// Assembled configuration, read once at process start (spec §6).
#[derive(Debug, Clone)]
pub struct Settings {
    // Required
    pub document_search_url: String,
    pub s3_endpoint_uri: String,
    pub s3_bucket_name: String,
    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,
    pub s3_region: String,
    pub vector_db_url: String,
    pub logs_database_url: String,

    // Optional with defaults
    pub embedding_dimensions: u32,
    pub embedding_model_name: String,
    pub keyword_model_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_insert_batch_size: usize,
    pub files_concurrency_size: ConcurrencyMode,
    pub keyword_extraction_workers: ConcurrencyMode,
    pub auto_create_pgvector_extension: bool,
    pub get_project_page: u32,
    pub get_docs_page: u32,
    pub ocr_enabled: bool,
    pub ocr_provider: OcrProvider,
    pub ocr_dpi: u32,
    pub ocr_language: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Read and validate every environment variable spec §6 enumerates.
    /// Fails fast (fatal, maps to exit code 3) on any missing required var
    /// or unparsable optional value -- matches `foiacquire::config`'s
    /// eager `DATABASE_URL` validation rather than masking misconfiguration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Settings {
            document_search_url: required("DOCUMENT_SEARCH_URL")?,
            s3_endpoint_uri: required("S3_ENDPOINT_URI")?,
            s3_bucket_name: required("S3_BUCKET_NAME")?,
            s3_access_key_id: required("S3_ACCESS_KEY_ID")?,
            s3_secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            s3_region: required("S3_REGION")?,
            vector_db_url: required("VECTOR_DB_URL")?,
            logs_database_url: env::var("LOGS_DATABASE_URL")
                .or_else(|_| env::var("VECTOR_DB_URL"))
                .map_err(|_| ConfigError::Missing("LOGS_DATABASE_URL"))?,

            embedding_dimensions: optional_parsed("EMBEDDING_DIMENSIONS", 768)?,
            embedding_model_name: env::var("EMBEDDING_MODEL_NAME")
                .unwrap_or_else(|_| "all-mpnet-base-v2".to_string()),
            keyword_model_name: env::var("KEYWORD_MODEL_NAME")
                .unwrap_or_else(|_| "all-mpnet-base-v2".to_string()),
            chunk_size: optional_parsed("CHUNK_SIZE", 1000)?,
            chunk_overlap: optional_parsed("CHUNK_OVERLAP", 200)?,
            chunk_insert_batch_size: optional_parsed("CHUNK_INSERT_BATCH_SIZE", 25)?,
            files_concurrency_size: optional_parsed(
                "FILES_CONCURRENCY_SIZE",
                ConcurrencyMode::Auto,
            )?,
            keyword_extraction_workers: optional_parsed(
                "KEYWORD_EXTRACTION_WORKERS",
                ConcurrencyMode::Auto,
            )?,
            auto_create_pgvector_extension: optional_parsed(
                "AUTO_CREATE_PGVECTOR_EXTENSION",
                true,
            )?,
            get_project_page: optional_parsed("GET_PROJECT_PAGE", 1)?,
            get_docs_page: optional_parsed("GET_DOCS_PAGE", 1000)?,
            ocr_enabled: optional_parsed("OCR_ENABLED", true)?,
            ocr_provider: optional_parsed("OCR_PROVIDER", OcrProvider::Tesseract)?,
            ocr_dpi: optional_parsed("OCR_DPI", 300)?,
            ocr_language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "eng".to_string()),
        };

        if settings.chunk_overlap >= settings.chunk_size {
            return Err(ConfigError::Invalid {
                name: "CHUNK_OVERLAP",
                value: settings.chunk_overlap.to_string(),
                reason: "must be smaller than CHUNK_SIZE".to_string(),
            });
        }

        tracing::debug!(
            embedding_dimensions = settings.embedding_dimensions,
            chunk_size = settings.chunk_size,
            chunk_overlap = settings.chunk_overlap,
            ocr_provider = %settings.ocr_provider,
            "settings loaded"
        );

        Ok(settings)
    }

    pub fn resolved_worker_count(&self) -> usize {
        self.files_concurrency_size.resolve_workers(num_cpus::get())
    }

    pub fn resolved_keyword_threads(&self) -> usize {
        self.keyword_extraction_workers
            .resolve_keyword_threads(num_cpus::get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_tiering_matches_spec() {
        assert_eq!(ConcurrencyMode::Auto.resolve_workers(32), 16);
        assert_eq!(ConcurrencyMode::Auto.resolve_workers(8), 8);
        assert_eq!(ConcurrencyMode::AutoFull.resolve_workers(8), 8);
        assert_eq!(ConcurrencyMode::AutoConservative.resolve_workers(8), 2);
        assert_eq!(ConcurrencyMode::Fixed(5).resolve_workers(100), 5);
    }

    #[test]
    fn keyword_thread_tiering_matches_spec() {
        assert_eq!(ConcurrencyMode::Auto.resolve_keyword_threads(32), 2);
        assert_eq!(ConcurrencyMode::Auto.resolve_keyword_threads(10), 3);
        assert_eq!(ConcurrencyMode::Auto.resolve_keyword_threads(4), 4);
        assert_eq!(ConcurrencyMode::AutoAggressive.resolve_keyword_threads(2), 4);
        assert_eq!(ConcurrencyMode::AutoConservative.resolve_keyword_threads(99), 1);
    }

    #[test]
    fn concurrency_mode_parses_integers() {
        assert_eq!("7".parse::<ConcurrencyMode>().unwrap(), ConcurrencyMode::Fixed(7));
        assert!("nonsense".parse::<ConcurrencyMode>().is_err());
    }
}
