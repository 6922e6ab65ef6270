pub mod pdf;
pub mod tesseract;
pub mod types;

use anyhow::Result;

pub use types::{EngineDiag, ExtractError};

/// Turns PDF bytes into plain text.
pub trait PdfTextExtractor: Send + Sync {
    /// Per-page text in page order, each page followed by `\n`. Pages without
    /// text contribute an empty string.
    fn extract_pdf_text(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Turns image bytes into plain text.
pub trait OcrEngine: Send + Sync {
    fn doctor(&self) -> Result<EngineDiag>;
    fn image_to_text(&self, bytes: &[u8]) -> Result<String, ExtractError>;
}
