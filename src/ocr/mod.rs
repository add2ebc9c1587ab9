//! Pluggable OCR backends: Tesseract (local, default) and Azure Document
//! Intelligence (cloud). See `router` for selection policy.

mod azure;
mod backend;
mod model_utils;
mod router;
mod tesseract;

pub use backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
pub use router::OcrRouter;
