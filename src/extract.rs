//! Generic text extraction from uploaded PDFs and images.

use crate::{
    config::Config,
    engine::{ExtractError, OcrEngine, PdfTextExtractor},
    postprocess::clean_text,
    util::dotted_extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    pub filename: String,
    pub file_type: String,
}

#[derive(Clone)]
pub struct Extractor {
    cfg: Config,
    pdf: Arc<dyn PdfTextExtractor>,
    ocr: Arc<dyn OcrEngine>,
}

impl Extractor {
    pub fn new(cfg: &Config, pdf: Arc<dyn PdfTextExtractor>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            cfg: cfg.clone(),
            pdf,
            ocr,
        }
    }

    /// MIME type guessed from the filename, checked against the allowed extensions.
    pub fn detect_type(&self, filename: &str) -> Result<String, ExtractError> {
        let mime = mime_guess::from_path(filename)
            .first()
            .ok_or(ExtractError::UnknownType)?;
        let essence = mime.essence_str().to_string();

        let allowed = dotted_extension(filename).is_some_and(|ext| {
            self.cfg
                .extract
                .allowed_extensions
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&ext))
        });
        if !allowed || !(essence == "application/pdf" || essence.starts_with("image/")) {
            return Err(ExtractError::UnsupportedType(essence));
        }
        Ok(essence)
    }

    /// Blocking; runs PDF parsing or OCR on the calling thread.
    pub fn extract(&self, filename: &str, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let file_type = self.detect_type(filename)?;

        let (raw, empty_err) = if file_type == "application/pdf" {
            (self.pdf.extract_pdf_text(bytes)?, ExtractError::NoTextInPdf)
        } else {
            (self.ocr.image_to_text(bytes)?, ExtractError::NoTextInImage)
        };

        let text = clean_text(&self.cfg.postprocess, &raw).trim().to_string();
        if text.is_empty() {
            return Err(empty_err);
        }

        info!(
            "extracted {} characters from {} ({})",
            text.chars().count(),
            filename,
            file_type
        );
        Ok(Extraction {
            text,
            filename: filename.to_string(),
            file_type,
        })
    }
}
