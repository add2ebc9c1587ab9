//! Shared OCR backend utility: CLI tool availability checks. Trimmed from
//! the teacher's `ocr/model_utils.rs` (model-download machinery dropped --
//! this crate has no pure-Rust `ocrs`/`paddle` backend, only shell-out
//! Tesseract + HTTP-based Azure).

use std::process::Command;

pub fn check_binary(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
