use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of probing an external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineDiag {
    pub engine: String,
    pub executable: String,
    pub version: Option<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not determine file type. Please ensure the file has a proper extension.")]
    UnknownType,

    #[error("Unsupported file type: {0}. Please upload PDF or image files.")]
    UnsupportedType(String),

    #[error(
        "No text could be extracted from the PDF. The file might be image-based or empty."
    )]
    NoTextInPdf,

    #[error(
        "No text could be extracted from the image. The image might not contain readable text."
    )]
    NoTextInImage,

    #[error("Invalid or corrupted PDF file: {0}")]
    CorruptPdf(String),

    #[error("Invalid or corrupted image file")]
    CorruptImage,

    #[error("OCR processing failed: {0}")]
    Ocr(String),
}

impl ExtractError {
    /// Whether the failure is attributable to the uploaded content rather than the service.
    pub fn is_unprocessable(&self) -> bool {
        matches!(
            self,
            Self::NoTextInPdf | Self::NoTextInImage | Self::CorruptPdf(_) | Self::CorruptImage
        )
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::UnknownType | Self::UnsupportedType(_))
    }
}
