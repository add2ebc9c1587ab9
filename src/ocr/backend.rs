//! The pluggable OCR capability set (spec §9: "Define a capability set
//! `ExtractText(pdfBytes, config) -> [(page, text)]`; concrete variants are
//! the local CPU-based provider and the cloud document-intelligence
//! provider. The router chooses one at startup; no automatic cross-provider
//! fallback").
//!
//! Reconstructed from the *usage* of the teacher's own `ocr/backend.rs`
//! (absent from the retrieved pack) as seen in `ocr/tesseract.rs`'s
//! `use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError,
//! OcrResult}` and its trait-impl method signatures.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrBackendType {
    Tesseract,
    Azure,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub language: String,
    pub dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),
    #[error("OCR failed: {0}")]
    OcrFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub backend: OcrBackendType,
    pub processing_time_ms: u64,
}

/// One OCR provider. Concrete implementations: `TesseractBackend` (local
/// CPU-based, default) and `AzureBackend` (cloud document-intelligence).
pub trait OcrBackend: Send + Sync {
    fn backend_type(&self) -> OcrBackendType;
    fn is_available(&self) -> bool;
    fn availability_hint(&self) -> String;
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError>;
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError>;

    /// OCR every page of a PDF document, in page order. The default fans
    /// out to `ocr_pdf_page` once per page -- the shape a per-page
    /// rasterizing backend (Tesseract) needs. A backend whose upstream API
    /// analyzes the whole document in one call (Azure) must override this
    /// instead of pretending to support independent single-page calls,
    /// otherwise every page ends up carrying the whole document's text.
    fn ocr_pdf_pages(&self, pdf_path: &Path, page_count: u32) -> Result<Vec<OcrResult>, OcrError> {
        (1..=page_count.max(1))
            .map(|page| self.ocr_pdf_page(pdf_path, page))
            .collect()
    }
}
