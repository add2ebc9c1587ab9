//! Shared status/reason taxonomy for the processing log.
//!
//! Kept as a fixed enum rather than free-form strings so that `--retry-failed`
//! and `--retry-skipped` admission can match on `ProcessingStatus` and every
//! failure is explainable by one of the codes below (spec: validation-reason
//! taxonomy is enumerated, never free-form).

use std::fmt;

/// Outcome of a single document processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingStatus {
    Success,
    Failure,
    Skipped,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Success => "success",
            ProcessingStatus::Failure => "failure",
            ProcessingStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ProcessingStatus::Success),
            "failure" => Some(ProcessingStatus::Failure),
            "skipped" => Some(ProcessingStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed validation-reason taxonomy (spec §7). Never free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    PrecheckFailed,
    ScannedOrImagePdf,
    OcrFailed,
    PdfParseError,
    FetchError,
    EmptyText,
    EmptyAfterChunking,
    EmbeddingFailed,
    DbWriteFailed,
    Cancelled,
    UnexpectedError,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::PrecheckFailed => "precheck_failed",
            ValidationReason::ScannedOrImagePdf => "scanned_or_image_pdf",
            ValidationReason::OcrFailed => "ocr_failed",
            ValidationReason::PdfParseError => "pdf_parse_error",
            ValidationReason::FetchError => "fetch_error",
            ValidationReason::EmptyText => "empty_text",
            ValidationReason::EmptyAfterChunking => "empty_after_chunking",
            ValidationReason::EmbeddingFailed => "embedding_failed",
            ValidationReason::DbWriteFailed => "db_write_failed",
            ValidationReason::Cancelled => "cancelled",
            ValidationReason::UnexpectedError => "unexpected_error",
        }
    }

    /// Whether a document ending with this reason is retry-eligible failure
    /// (as opposed to an intentional skip).
    pub fn status(&self) -> ProcessingStatus {
        match self {
            ValidationReason::PrecheckFailed | ValidationReason::ScannedOrImagePdf => {
                ProcessingStatus::Skipped
            }
            _ => ProcessingStatus::Failure,
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry admission policy (spec §4.1, §9). `--retry-failed` and
/// `--retry-skipped` are mutually exclusive; this is enforced at CLI parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryMode {
    #[default]
    None,
    FailedOnly,
    SkippedOnly,
}

impl RetryMode {
    pub fn matches(&self, status: ProcessingStatus) -> bool {
        match self {
            RetryMode::None => status != ProcessingStatus::Success,
            RetryMode::FailedOnly => status == ProcessingStatus::Failure,
            RetryMode::SkippedOnly => status == ProcessingStatus::Skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_status_mapping() {
        assert_eq!(
            ValidationReason::PrecheckFailed.status(),
            ProcessingStatus::Skipped
        );
        assert_eq!(
            ValidationReason::OcrFailed.status(),
            ProcessingStatus::Failure
        );
    }

    #[test]
    fn retry_mode_admission() {
        assert!(RetryMode::FailedOnly.matches(ProcessingStatus::Failure));
        assert!(!RetryMode::FailedOnly.matches(ProcessingStatus::Skipped));
        assert!(RetryMode::SkippedOnly.matches(ProcessingStatus::Skipped));
        assert!(!RetryMode::None.matches(ProcessingStatus::Success));
        assert!(RetryMode::None.matches(ProcessingStatus::Failure));
    }
}
