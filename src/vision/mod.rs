//! Vision-capable LLM used to read problem numbers and draft tutoring steps.

pub mod analysis;
pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

pub use analysis::{Analysis, ConstructionStep, parse_analysis};
pub use gemini::GeminiClient;

/// An uploaded drawing as sent to the model.
#[derive(Debug, Clone, Copy)]
pub struct ImageInput<'a> {
    pub mime_type: &'a str,
    pub data: &'a [u8],
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs and health output.
    fn name(&self) -> &str;

    /// Sends one prompt plus one image and returns the model's text reply.
    async fn generate(&self, prompt: &str, image: ImageInput<'_>) -> Result<String, VisionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("API error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("vision model not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for VisionError {
    /// Drops the request URL so error text never echoes endpoint details.
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}
