use crate::{
    textbook::{ContextSource, ProblemId, SectionIndex},
    vision::{
        Analysis, ImageInput, VisionModel, parse_analysis,
        prompt::{analysis_prompt, problem_number_prompt},
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Upload types the vision model accepts for analysis.
pub const ACCEPTED_CONTENT_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/jpg", "application/pdf"];

#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    #[error("Invalid file type. Expected image/PDF, got {0}")]
    InvalidType(String),
    #[error("Textbook not loaded. Please contact administrator.")]
    TextbookNotLoaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub analysis: Analysis,
    pub filename: String,
    pub detected_problem: Option<String>,
    pub context_used: ContextSource,
}

/// Recognises the problem on an uploaded drawing, picks the matching
/// textbook excerpt and asks the vision model for a worked solution.
#[derive(Clone)]
pub struct Mentor {
    index: Arc<SectionIndex>,
    vision: Arc<dyn VisionModel>,
}

impl Mentor {
    pub fn new(index: Arc<SectionIndex>, vision: Arc<dyn VisionModel>) -> Self {
        Self { index, vision }
    }

    pub fn model_name(&self) -> &str {
        self.vision.name()
    }

    pub async fn analyze(
        &self,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<AnalyzeResponse, MentorError> {
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type) {
            return Err(MentorError::InvalidType(content_type.to_string()));
        }
        if !self.index.is_loaded() {
            return Err(MentorError::TextbookNotLoaded);
        }

        let started = Instant::now();
        info!("analyzing {} ({} bytes)", filename, bytes.len());
        let image = ImageInput {
            mime_type: content_type,
            data: bytes,
        };

        let detected = self.detect_problem(image).await;
        let context = self
            .index
            .resolve_context(detected.as_ref().map(ProblemId::as_str));
        info!(
            "context source={:?} chars={}",
            context.source,
            context.text.chars().count()
        );

        let prompt = analysis_prompt(context.text, detected.as_ref());
        let analysis = match self.vision.generate(&prompt, image).await {
            Ok(reply) => {
                info!("received analysis reply: {} characters", reply.chars().count());
                parse_analysis(&reply)
            }
            Err(err) => {
                warn!("analysis request failed: {err}");
                Analysis::failed(err.to_string())
            }
        };

        info!("analysis of {} finished in {:?}", filename, started.elapsed());
        Ok(AnalyzeResponse {
            analysis,
            filename: filename.to_string(),
            detected_problem: detected.map(|id| id.to_string()),
            context_used: context.source,
        })
    }

    /// Asks the model which problem the drawing shows; any failure counts as "not detected".
    async fn detect_problem(&self, image: ImageInput<'_>) -> Option<ProblemId> {
        let rule = self.index.rule();
        match self.vision.generate(&problem_number_prompt(rule.group()), image).await {
            Ok(reply) => {
                let id = rule.problem_in_reply(&reply);
                match &id {
                    Some(id) => info!("detected problem {id}"),
                    None => warn!("no problem number in reply: {}", reply.trim()),
                }
                id
            }
            Err(err) => {
                warn!("problem number recognition failed: {err}");
                None
            }
        }
    }
}
