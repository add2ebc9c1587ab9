//! Full-document text extraction for extractable PDFs (spec §4.2/§4.3,
//! `TextExtractor` in SPEC_FULL §4). Direct adaptation of
//! `ocr/extractor.rs`'s `pdftotext`-per-page shell-out, split from
//! classification (now `PdfInspector`'s job).

use std::path::Path;
use std::process::Command;

pub use crate::pdf::cmd::CmdError as ExtractionError;
use crate::pdf::cmd;

/// One page's extracted text, in page order (spec §4.2: "emits a sequence
/// of (page_number, text) pairs").
pub struct ExtractedPage {
    pub page_number: u32,
    pub text: String,
}

pub struct TextExtractor {
    pub tesseract_lang: String,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            tesseract_lang: "eng".to_string(),
        }
    }
}

impl TextExtractor {
    pub fn new(language: &str) -> Self {
        Self {
            tesseract_lang: language.to_string(),
        }
    }

    /// Extract every page's text via `pdftotext`, one process invocation
    /// per page (matches `extract_pdf_page_text` in the teacher).
    pub fn extract_pages(
        &self,
        path: &Path,
        page_count: u32,
    ) -> Result<Vec<ExtractedPage>, ExtractionError> {
        let mut pages = Vec::with_capacity(page_count as usize);
        for page_number in 1..=page_count.max(1) {
            let text = self.extract_page_text(path, page_number)?;
            pages.push(ExtractedPage { page_number, text });
        }
        Ok(pages)
    }

    pub fn extract_page_text(&self, path: &Path, page: u32) -> Result<String, ExtractionError> {
        let page_str = page.to_string();
        cmd::run_capturing_stdout(
            Command::new("pdftotext")
                .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
                .arg(path)
                .arg("-"),
            "pdftotext (install poppler-utils)",
            &format!("pdftotext failed on page {page}"),
        )
    }

    pub fn get_pdf_page_count(path: &Path) -> Option<u32> {
        let output = Command::new("pdfinfo").arg(path).output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find(|line| line.starts_with("Pages:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|s| s.parse().ok())
    }
}

/// Total non-whitespace character count across all pages, used to detect
/// `empty_text` (spec §4.2 state `extracting`).
pub fn total_non_whitespace_chars(pages: &[ExtractedPage]) -> usize {
    pages
        .iter()
        .map(|p| p.text.chars().filter(|c| !c.is_whitespace()).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_chars_sums_across_pages() {
        let pages = vec![
            ExtractedPage {
                page_number: 1,
                text: "hello world".to_string(),
            },
            ExtractedPage {
                page_number: 2,
                text: "  \n  ".to_string(),
            },
        ];
        assert_eq!(total_non_whitespace_chars(&pages), 10);
    }
}
