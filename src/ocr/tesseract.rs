//! Local CPU-based OCR backend: `pdftoppm` rasterization + `tesseract`.
//! Direct adaptation of the teacher's `TesseractBackend`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tempfile::TempDir;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
use super::model_utils::check_binary;

pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {stderr}")))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("tesseract not found (install tesseract-ocr)".to_string()),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn pdf_page_to_image(
        &self,
        pdf_path: &Path,
        page: u32,
        output_dir: &Path,
    ) -> Result<PathBuf, OcrError> {
        let page_str = page.to_string();
        let dpi_str = self.config.dpi.to_string();
        let output_prefix = output_dir.join("page");

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(&output_prefix)
            .status();

        match status {
            Ok(s) if s.success() => self
                .find_page_image(output_dir, page)
                .ok_or_else(|| OcrError::OcrFailed(format!("no image generated for page {page}"))),
            Ok(_) => Err(OcrError::OcrFailed(
                "pdftoppm failed to convert PDF page".to_string(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("pdftoppm not found (install poppler-utils)".to_string()),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn find_page_image(&self, temp_path: &Path, page_num: u32) -> Option<PathBuf> {
        for digits in [2, 3, 4] {
            let filename = format!("page-{page_num:0digits$}.png");
            let path = temp_path.join(&filename);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }
}

impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if !check_binary("pdftoppm") {
            "pdftoppm not installed. Install with: apt install poppler-utils".to_string()
        } else {
            "Tesseract is available".to_string()
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_tesseract(image_path)?;
        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Tesseract,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let temp_dir = TempDir::new()?;
        let image_path = self.pdf_page_to_image(pdf_path, page, temp_dir.path())?;
        let text = self.run_tesseract(&image_path)?;
        Ok(OcrResult {
            text,
            confidence: None,
            backend: OcrBackendType::Tesseract,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
