use crate::{config::Config, extract::Extractor, mentor::Mentor, textbook::SectionIndex};
use std::sync::Arc;

/// Shared, read-only state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub index: Arc<SectionIndex>,
    /// `None` when no vision model could be configured at startup.
    pub mentor: Option<Mentor>,
    pub extractor: Extractor,
}
