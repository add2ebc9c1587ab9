//! Selects one OCR backend at startup per `OCR_PROVIDER`; no automatic
//! cross-provider fallback (spec §9).

use std::path::Path;

use crate::config::{OcrProvider, Settings};

use super::azure::AzureBackend;
use super::backend::{OcrBackend, OcrConfig, OcrError, OcrResult};
use super::tesseract::TesseractBackend;

pub struct OcrRouter {
    backend: Box<dyn OcrBackend>,
}

impl OcrRouter {
    pub fn from_settings(settings: &Settings) -> Self {
        let config = OcrConfig {
            language: settings.ocr_language.clone(),
            dpi: settings.ocr_dpi,
        };

        let backend: Box<dyn OcrBackend> = match settings.ocr_provider {
            OcrProvider::Tesseract => Box::new(TesseractBackend::new(config)),
            OcrProvider::Azure => Box::new(AzureBackend::new(
                std::env::var("AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT").unwrap_or_default(),
                std::env::var("AZURE_DOCUMENT_INTELLIGENCE_KEY").unwrap_or_default(),
                config,
            )),
        };

        if !backend.is_available() {
            tracing::warn!(hint = %backend.availability_hint(), "configured OCR backend is not available");
        }

        Self { backend }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    pub fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        self.backend.ocr_pdf_page(pdf_path, page)
    }

    /// OCR every page of the document in one dispatch, letting whole-document
    /// backends (Azure) analyze once instead of being called once per page.
    pub fn ocr_pdf_pages(&self, pdf_path: &Path, page_count: u32) -> Result<Vec<OcrResult>, OcrError> {
        self.backend.ocr_pdf_pages(pdf_path, page_count)
    }
}
