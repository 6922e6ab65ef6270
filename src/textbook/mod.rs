//! Textbook section index.
//!
//! The textbook PDF is extracted once at startup and split into one excerpt
//! per problem marker. The resulting [`SectionIndex`] is immutable and is
//! shared read-only between request handlers.

pub mod problem_id;
pub mod segment;

use crate::{
    engine::PdfTextExtractor,
    util::{now_rfc3339, sha256_hex},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

pub use problem_id::ProblemId;
pub use segment::{Section, SegmentRule, Segmentation, segment};

#[derive(Debug)]
pub struct SectionIndex {
    rule: SegmentRule,
    raw: String,
    sections: BTreeMap<ProblemId, Section>,
    markers_found: usize,
    character_count: usize,
    loaded: bool,
    source_path: Option<String>,
    source_sha256: Option<String>,
    loaded_at: Option<String>,
}

/// Diagnostic snapshot of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub loaded: bool,
    pub source_path: Option<String>,
    pub section_count: usize,
    pub markers_found: usize,
    /// Known identifiers in lexicographic order.
    pub identifiers: Vec<String>,
    pub character_count: usize,
    pub source_sha256: Option<String>,
    pub loaded_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    SpecificSection,
    FullText,
}

/// Textbook text chosen as context for one problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextbookContext<'a> {
    pub text: &'a str,
    pub source: ContextSource,
}

impl SectionIndex {
    /// Reads and segments the textbook at `path`.
    ///
    /// Never fails: a missing file, unreadable PDF or empty extraction yields
    /// an index that reports `loaded == false` and answers every lookup with
    /// "not found". There is no later reload.
    pub fn load(path: &Path, rule: SegmentRule, extractor: &dyn PdfTextExtractor) -> Self {
        info!("loading textbook from {}", path.display());
        match read_textbook(path, extractor) {
            Ok((raw, sha)) => {
                let mut index = Self::from_text(raw, rule);
                index.source_path = Some(path.display().to_string());
                index.source_sha256 = Some(sha);
                index
            }
            Err(err) => {
                warn!("textbook not loaded: {:#}", err);
                let mut index = Self::not_loaded(rule);
                index.source_path = Some(path.display().to_string());
                index
            }
        }
    }

    /// Builds a loaded index over already-extracted text.
    pub fn from_text(raw: String, rule: SegmentRule) -> Self {
        let Segmentation {
            sections,
            markers_found,
        } = segment(&raw, &rule);

        if markers_found == 0 {
            warn!(
                "no problem markers matched /{}/; lookups will fall back to full text",
                rule.marker_pattern()
            );
        } else {
            info!(
                "found {} problem markers, {} distinct sections",
                markers_found,
                sections.len()
            );
        }
        for section in sections.values() {
            debug!(
                "section {} marker@{} bytes={}..{}",
                section.id, section.marker_offset, section.span.start, section.span.end
            );
        }

        let character_count = raw.chars().count();
        Self {
            rule,
            raw,
            sections,
            markers_found,
            character_count,
            loaded: true,
            source_path: None,
            source_sha256: None,
            loaded_at: Some(now_rfc3339()),
        }
    }

    pub fn not_loaded(rule: SegmentRule) -> Self {
        Self {
            rule,
            raw: String::new(),
            sections: BTreeMap::new(),
            markers_found: 0,
            character_count: 0,
            loaded: false,
            source_path: None,
            source_sha256: None,
            loaded_at: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn group(&self) -> &str {
        self.rule.group()
    }

    pub fn rule(&self) -> &SegmentRule {
        &self.rule
    }

    /// Looks up a problem by `"12.7"`, `"12-7"` or bare `"7"` form.
    pub fn get_section(&self, problem: &str) -> Option<&str> {
        if !self.loaded {
            return None;
        }
        let key = ProblemId::normalize(problem, self.rule.group());
        self.sections
            .get(&key)
            .map(|section| &self.raw[section.span.clone()])
    }

    /// The complete extracted text; empty when the textbook is not loaded.
    pub fn get_full_text(&self) -> &str {
        &self.raw
    }

    /// Picks the section for `problem`, or the full text when no problem was
    /// detected or its section is unknown.
    pub fn resolve_context(&self, problem: Option<&str>) -> TextbookContext<'_> {
        if let Some(problem) = problem {
            if let Some(text) = self.get_section(problem) {
                return TextbookContext {
                    text,
                    source: ContextSource::SpecificSection,
                };
            }
            warn!("problem {} not found, using full text", problem);
        } else {
            debug!("no problem detected, using full text");
        }
        TextbookContext {
            text: self.get_full_text(),
            source: ContextSource::FullText,
        }
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            loaded: self.loaded,
            source_path: self.source_path.clone(),
            section_count: self.sections.len(),
            markers_found: self.markers_found,
            identifiers: self.sections.keys().map(|id| id.to_string()).collect(),
            character_count: self.character_count,
            source_sha256: self.source_sha256.clone(),
            loaded_at: self.loaded_at.clone(),
        }
    }
}

fn read_textbook(path: &Path, extractor: &dyn PdfTextExtractor) -> Result<(String, String)> {
    if !path.exists() {
        anyhow::bail!("textbook PDF not found: {}", path.display());
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("reading textbook: {}", path.display()))?;
    let sha = sha256_hex(&bytes);
    let raw = extractor
        .extract_pdf_text(&bytes)
        .with_context(|| format!("extracting textbook text: {}", path.display()))?;
    if raw.trim().is_empty() {
        anyhow::bail!("textbook PDF yielded no text: {}", path.display());
    }
    info!("extracted {} characters from textbook", raw.chars().count());
    Ok((raw, sha))
}
