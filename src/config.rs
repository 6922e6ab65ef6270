use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub textbook: Textbook,
    #[serde(default)]
    pub gemini: Gemini,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub extract: Extract,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Applies environment overrides that the original deployment relied on.
    pub fn apply_env(&mut self) {
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                self.gemini.model = model.trim().to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub bind: String,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}
impl Default for Server {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            allowed_origins: vec![
                "http://localhost".into(),
                "http://localhost:80".into(),
                "http://localhost:5173".into(),
                "http://localhost:3000".into(),
            ],
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Textbook {
    pub pdf_path: String,
    /// Word that opens a problem marker, e.g. "Problem" in "Problem 12-7".
    pub marker_word: String,
    /// Chapter prefix shared by every problem identifier.
    pub group: String,
    /// Characters of preceding context kept in front of each marker.
    pub lead_in_chars: usize,
}
impl Default for Textbook {
    fn default() -> Self {
        Self {
            pdf_path: "TEXTBOOK.pdf".into(),
            marker_word: "Problem".into(),
            group: "12".into(),
            lead_in_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gemini {
    pub api_key_env: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
}
impl Default for Gemini {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".into(),
            model: "gemini-2.0-flash-exp".into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            temperature: 0.2,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ocr {
    pub tesseract_exe: String,
    pub lang: String,
    pub timeout_seconds: u64,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            tesseract_exe: "tesseract".into(),
            lang: "eng".into(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extract {
    pub allowed_extensions: Vec<String>,
}
impl Default for Extract {
    fn default() -> Self {
        Self {
            allowed_extensions: [".pdf", ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Postprocess {
    pub normalize_newlines: bool,
    pub normalize_unicode: bool,
    pub trim_trailing_whitespace: bool,
    #[serde(default)]
    pub control_chars_to_sanitize: Vec<u8>,
}
impl Default for Postprocess {
    fn default() -> Self {
        Self {
            normalize_newlines: true,
            normalize_unicode: false,
            trim_trailing_whitespace: true,
            control_chars_to_sanitize: vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x0b, 0x0c],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
