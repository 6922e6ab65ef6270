use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Structured tutoring answer returned by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub problem_identification: String,
    pub construction_steps: Vec<ConstructionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// given_information, required_output, key_concept, common_mistakes and
    /// anything else the model chose to add.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionStep {
    pub step: u64,
    pub instruction: String,
    pub explanation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Analysis {
    /// Placeholder returned when the model could not be asked at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            problem_identification: "Error occurred".into(),
            construction_steps: Vec::new(),
            error: Some(error.into()),
            raw_response: None,
            extra: Map::new(),
        }
    }

    fn unparseable(raw: &str) -> Self {
        Self {
            problem_identification: "Parse error".into(),
            construction_steps: Vec::new(),
            error: Some("Failed to parse AI response".into()),
            raw_response: Some(raw.to_string()),
            extra: Map::new(),
        }
    }
}

/// Parses the model reply, tolerating code fences and filling in missing fields.
pub fn parse_analysis(reply: &str) -> Analysis {
    let cleaned = strip_code_fence(reply);

    let mut obj = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => {
            warn!("analysis reply is JSON but not an object");
            return Analysis::unparseable(reply);
        }
        Err(err) => {
            let preview: String = reply.chars().take(200).collect();
            warn!("failed to parse analysis JSON: {err}; reply starts: {preview}");
            return Analysis::unparseable(reply);
        }
    };

    let problem_identification = match obj.remove("problem_identification") {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => {
            warn!("analysis missing problem_identification");
            "Not provided".to_string()
        }
        Some(other) => other.to_string(),
    };

    let construction_steps = match obj.remove("construction_steps") {
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::Object(step) => Some(normalize_step(i, step)),
                _ => {
                    warn!("dropping non-object construction step at {i}");
                    None
                }
            })
            .collect(),
        Some(_) => {
            warn!("construction_steps is not a list");
            Vec::new()
        }
        None => {
            warn!("analysis missing construction_steps");
            Vec::new()
        }
    };

    let error = obj
        .remove("error")
        .and_then(|v| v.as_str().map(String::from));
    let raw_response = obj
        .remove("raw_response")
        .and_then(|v| v.as_str().map(String::from));

    info!("parsed {} construction steps", construction_steps.len());

    Analysis {
        problem_identification,
        construction_steps,
        error,
        raw_response,
        extra: obj,
    }
}

fn normalize_step(index: usize, mut step: Map<String, Value>) -> ConstructionStep {
    let number = step
        .remove("step")
        .and_then(|v| v.as_u64())
        .unwrap_or(index as u64 + 1);
    let instruction = take_string(&mut step, "instruction")
        .unwrap_or_else(|| "Step instruction not provided".to_string());
    let explanation = take_string(&mut step, "explanation")
        .unwrap_or_else(|| "Explanation not provided".to_string());
    ConstructionStep {
        step: number,
        instruction,
        explanation,
        extra: step,
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }
}
