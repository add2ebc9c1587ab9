//! First-pass PDF classification (spec §4.2). Grounded on
//! `ocr/extractor.rs`'s `pdfinfo`/`pdftotext` shell-out pattern, split out
//! from full-text extraction since the spec separates "classify" from
//! "extract".

use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::models::PdfMetadata;
use crate::pdf::cmd::{self, CmdError};

pub const NO_TEXT_CHAR_THRESHOLD: usize = 50;
pub const SCANNED_MINIMAL_TEXT_THRESHOLD: usize = 200;

#[derive(Debug, Error)]
pub enum PdfInspectorError {
    #[error("not a PDF (magic-byte check failed)")]
    NotAPdf,
    #[error("pdf open/parse failure: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Extractable,
    ScannedDevice,
    NoText,
}

pub struct PdfInspector;

impl PdfInspector {
    /// Magic-byte precheck: only a `%PDF-` header is accepted (spec §4.2,
    /// "non-PDF content (magic-byte check fails)"). Mirrors the `infer`
    /// crate's MIME-sniffing used elsewhere in this crate for the same
    /// purpose.
    pub fn is_pdf(bytes: &[u8]) -> bool {
        infer::get(bytes).map(|t| t.mime_type()) == Some("application/pdf")
            || bytes.starts_with(b"%PDF-")
    }

    /// Classify a PDF already written to a temp path on disk (pdfinfo and
    /// pdftotext are file-oriented tools, matching the teacher's extractor).
    pub fn inspect(path: &Path, file_size: u64) -> Result<(Classification, PdfMetadata), PdfInspectorError> {
        let info = Self::run_pdfinfo(path);
        let (producer, creator, page_count, pdf_version) = match &info {
            Ok(text) => (
                extract_field(text, "Producer"),
                extract_field(text, "Creator"),
                extract_field(text, "Pages").and_then(|s| s.parse::<u32>().ok()),
                extract_field(text, "PDF version"),
            ),
            Err(_) => (None, None, None, None),
        };

        let metadata = PdfMetadata {
            producer,
            creator,
            page_count,
            file_size,
            pdf_version,
        };

        if info.is_err() {
            return Err(PdfInspectorError::Corrupt(
                "pdfinfo could not open the document".to_string(),
            ));
        }

        if metadata.matches_scanning_device() {
            return Ok((Classification::ScannedDevice, metadata));
        }

        let first_page_chars = Self::probe_first_page_chars(path);
        let classification = match first_page_chars {
            Some(n) if n >= NO_TEXT_CHAR_THRESHOLD => Classification::Extractable,
            _ => Classification::NoText,
        };

        Ok((classification, metadata))
    }

    fn run_pdfinfo(path: &Path) -> Result<String, CmdError> {
        cmd::run_capturing_stdout(
            Command::new("pdfinfo").arg(path),
            "pdfinfo (install poppler-utils)",
            "pdfinfo failed",
        )
    }

    /// Attempt first-page extraction and count non-whitespace characters,
    /// used to distinguish `extractable` from `no-text` (spec §4.2).
    fn probe_first_page_chars(path: &Path) -> Option<usize> {
        let output = cmd::run_capturing_stdout(
            Command::new("pdftotext").args(["-layout", "-enc", "UTF-8", "-f", "1", "-l", "1"]).arg(path).arg("-"),
            "pdftotext (install poppler-utils)",
            "pdftotext failed on page 1",
        )
        .ok()?;
        Some(output.chars().filter(|c| !c.is_whitespace()).count())
    }
}

fn extract_field(pdfinfo_output: &str, field: &str) -> Option<String> {
    let prefix = format!("{field}:");
    pdfinfo_output.lines().find_map(|line| {
        line.strip_prefix(&prefix)
            .map(|rest| rest.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_magic_bytes() {
        assert!(PdfInspector::is_pdf(b"%PDF-1.4\n..."));
        assert!(!PdfInspector::is_pdf(b"PK\x03\x04 not a pdf"));
    }

    #[test]
    fn extract_field_parses_pdfinfo_lines() {
        let sample = "Producer:       Ricoh MP C3004\nPages:          3\n";
        assert_eq!(extract_field(sample, "Producer").as_deref(), Some("Ricoh MP C3004"));
        assert_eq!(extract_field(sample, "Pages").as_deref(), Some("3"));
        assert_eq!(extract_field(sample, "Missing"), None);
    }

    #[test]
    fn scanning_device_signature_detection() {
        let meta = PdfMetadata {
            producer: Some("Ricoh MP C3004 scanner driver".to_string()),
            ..Default::default()
        };
        assert!(meta.matches_scanning_device());

        let clean = PdfMetadata {
            producer: Some("Microsoft Word".to_string()),
            ..Default::default()
        };
        assert!(!clean.matches_scanning_device());
    }
}
