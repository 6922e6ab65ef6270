use super::{ImageInput, VisionError, VisionModel};
use crate::config::Gemini;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    cfg: Gemini,
}

impl GeminiClient {
    pub fn new(api_key: String, cfg: &Gemini) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
            .build()?;
        Ok(Self {
            client,
            api_key,
            cfg: cfg.clone(),
        })
    }

    /// Reads the key from the environment variable named by `api_key_env`.
    pub fn from_env(cfg: &Gemini) -> Result<Self, VisionError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| VisionError::NotConfigured(format!("{} is not set", cfg.api_key_env)))?;
        Self::new(api_key, cfg)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.model,
        )
    }

    /// Request body for the generateContent API: one user turn with a text
    /// part and an inline image part.
    fn build_request_body(cfg: &Gemini, prompt: &str, image: ImageInput<'_>) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    {
                        "inline_data": {
                            "mime_type": image.mime_type,
                            "data": BASE64.encode(image.data),
                        }
                    },
                ],
            }],
            "generationConfig": {
                "temperature": cfg.temperature,
                "topP": cfg.top_p,
                "topK": cfg.top_k,
                "maxOutputTokens": cfg.max_output_tokens,
            },
        })
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn name(&self) -> &str {
        &self.cfg.model
    }

    async fn generate(&self, prompt: &str, image: ImageInput<'_>) -> Result<String, VisionError> {
        let body = Self::build_request_body(&self.cfg, prompt, image);

        debug!(
            "Gemini request model={} prompt_chars={} image_bytes={}",
            self.cfg.model,
            prompt.chars().count(),
            image.data.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let text = resp["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                VisionError::Parse("missing candidates[0].content.parts[0].text".into())
            })?
            .trim()
            .to_string();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_prompt_image_and_generation_config() {
        let cfg = Gemini::default();
        let image = ImageInput {
            mime_type: "image/png",
            data: b"\x89PNG",
        };
        let body = GeminiClient::build_request_body(&cfg, "Which problem?", image);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "Which problem?");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "iVBORw==");
        assert_eq!(body["contents"][0]["role"], "user");

        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.2).abs() < 1e-6, "temperature should be ~0.2, got {temp}");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn endpoint_uses_model_and_trims_base_url() {
        let mut cfg = Gemini::default();
        cfg.base_url = "http://localhost:9999/v1beta/".into();
        cfg.model = "test-model".into();
        let client = GeminiClient::new("k".into(), &cfg).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/v1beta/models/test-model:generateContent"
        );
    }

    #[tokio::test]
    async fn failed_request_does_not_reveal_the_key() {
        let mut cfg = Gemini::default();
        cfg.base_url = "http://127.0.0.1:1/v1beta".into();
        cfg.timeout_seconds = 5;
        let client = GeminiClient::new("SECRET-GEMINI-KEY".into(), &cfg).unwrap();
        let image = ImageInput {
            mime_type: "image/png",
            data: b"png",
        };

        let err = client.generate("Which problem?", image).await.unwrap_err();
        assert!(matches!(err, VisionError::Http(_)));
        let text = format!("{err} {err:?}");
        assert!(!text.contains("SECRET-GEMINI-KEY"), "{text}");
        assert!(!text.contains("generateContent"), "{text}");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let mut cfg = Gemini::default();
        cfg.api_key_env = "DRAWING_MENTOR_TEST_KEY_THAT_IS_NEVER_SET".into();
        let err = GeminiClient::from_env(&cfg).err().unwrap();
        assert!(matches!(err, VisionError::NotConfigured(_)));
    }
}
