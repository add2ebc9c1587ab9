pub mod cmd;
pub mod extractor;
pub mod inspector;

pub use extractor::{ExtractionError, TextExtractor};
pub use inspector::{Classification, PdfInspector, PdfInspectorError};
