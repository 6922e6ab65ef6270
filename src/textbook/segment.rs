use super::problem_id::ProblemId;
use crate::config::Textbook;
use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::ops::Range;

/// How problem markers are recognised and how much lead-in each section keeps.
///
/// Also holds the looser `<group>-<n>` pattern used to read a problem number
/// out of a vision model's reply, so both are compiled once per group.
#[derive(Debug, Clone)]
pub struct SegmentRule {
    group: String,
    lead_in_chars: usize,
    marker: Regex,
    reply_number: Regex,
}

impl SegmentRule {
    /// Matches `<marker_word> <group>-<n>` (or `<group> <n>`), case-insensitive.
    pub fn new(marker_word: &str, group: &str, lead_in_chars: usize) -> Result<Self> {
        let pattern = format!(
            r"{}\s+{}[-\s](\d+)",
            regex::escape(marker_word),
            regex::escape(group)
        );
        let marker = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("compiling marker pattern: {pattern}"))?;
        let reply_pattern = format!(r"{}[-\s](\d+)", regex::escape(group));
        let reply_number = Regex::new(&reply_pattern)
            .with_context(|| format!("compiling reply pattern: {reply_pattern}"))?;
        Ok(Self {
            group: group.to_string(),
            lead_in_chars,
            marker,
            reply_number,
        })
    }

    pub fn from_config(cfg: &Textbook) -> Result<Self> {
        Self::new(&cfg.marker_word, &cfg.group, cfg.lead_in_chars)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn lead_in_chars(&self) -> usize {
        self.lead_in_chars
    }

    pub fn marker_pattern(&self) -> &str {
        self.marker.as_str()
    }

    /// First `"<group>-<n>"` (or `"<group> <n>"`) in free text; `None` covers "UNKNOWN".
    pub fn problem_in_reply(&self, reply: &str) -> Option<ProblemId> {
        let caps = self.reply_number.captures(reply)?;
        Some(ProblemId::from_marker(&self.group, caps.get(1)?.as_str()))
    }
}

/// One problem's excerpt, stored as a byte span into the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: ProblemId,
    /// Byte offset of the marker that opened this section.
    pub marker_offset: usize,
    /// Trimmed byte range of the section text.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    pub sections: BTreeMap<ProblemId, Section>,
    /// Markers seen in the text, duplicates included.
    pub markers_found: usize,
}

/// Splits `raw` into per-problem sections.
///
/// Markers are taken left to right without overlap. Section *i* runs from
/// `lead_in_chars` characters before marker *i* (clamped at 0) to the start
/// of marker *i+1*, or to the end of the text for the last marker, and is
/// then whitespace-trimmed. When the same problem number is marked twice the
/// later section replaces the earlier one.
pub fn segment(raw: &str, rule: &SegmentRule) -> Segmentation {
    let markers: Vec<(usize, &str)> = rule
        .marker
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let number = caps.get(1)?;
            Some((whole.start(), number.as_str()))
        })
        .collect();

    let mut sections = BTreeMap::new();
    for (i, &(pos, number)) in markers.iter().enumerate() {
        let start = lead_in_start(raw, pos, rule.lead_in_chars);
        let end = markers.get(i + 1).map(|&(next, _)| next).unwrap_or(raw.len());
        let id = ProblemId::from_marker(&rule.group, number);
        // last write wins
        sections.insert(
            id.clone(),
            Section {
                id,
                marker_offset: pos,
                span: trimmed_span(raw, start..end),
            },
        );
    }

    Segmentation {
        sections,
        markers_found: markers.len(),
    }
}

/// Byte offset `lead_in` characters before `pos`, or 0 when the text is shorter.
fn lead_in_start(raw: &str, pos: usize, lead_in: usize) -> usize {
    if lead_in == 0 {
        return pos;
    }
    raw[..pos]
        .char_indices()
        .rev()
        .nth(lead_in - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn trimmed_span(raw: &str, range: Range<usize>) -> Range<usize> {
    let slice = &raw[range.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let start = range.start + leading;
    start..start + slice.trim().len()
}
