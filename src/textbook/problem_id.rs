use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical `"<group>-<number>"` key of a textbook problem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(String);

impl ProblemId {
    /// Normalizes `"12.7"`, `"12-7"` and a bare `"7"` to `"12-7"` for group `"12"`.
    ///
    /// Every `.` becomes `-`, then `"<group>-"` is prepended unless already
    /// present. Nothing else is validated.
    pub fn normalize(raw: &str, group: &str) -> Self {
        let dashed = raw.replace('.', "-");
        let prefix = format!("{group}-");
        if dashed.starts_with(&prefix) {
            Self(dashed)
        } else {
            Self(format!("{prefix}{dashed}"))
        }
    }

    /// Builds the key for a marker whose numeric suffix was captured from the text.
    pub fn from_marker(group: &str, number: &str) -> Self {
        Self(format!("{group}-{number}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
