use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use drawing_mentor::{
    config::Config,
    server::{build_router, build_state},
    textbook::{SectionIndex, SegmentRule},
    vision::{GeminiClient, ImageInput, VisionError, VisionModel},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const BOUNDARY: &str = "mentor-test-boundary";
const TEXTBOOK: &str = "Preface material. Problem 12-1 alpha plate. Problem 12-2 beta lamina.";

/// Answers the problem-number prompt with a fixed reply and records every prompt.
struct ScriptedVision {
    problem_reply: &'static str,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVision {
    fn new(problem_reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            problem_reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn analysis_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _image: ImageInput<'_>) -> Result<String, VisionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("TEXTBOOK EXCERPT") {
            Ok(r#"{"problem_identification": "Lamina", "construction_steps": [{"step": 1, "instruction": "i", "explanation": "e"}]}"#.into())
        } else {
            Ok(self.problem_reply.into())
        }
    }
}

fn config() -> Config {
    let mut cfg = Config::default();
    cfg.textbook.lead_in_chars = 0;
    cfg
}

fn loaded_index(cfg: &Config) -> Arc<SectionIndex> {
    let rule = SegmentRule::from_config(&cfg.textbook).unwrap();
    Arc::new(SectionIndex::from_text(TEXTBOOK.to_string(), rule))
}

fn router(index: Arc<SectionIndex>, vision: Option<Arc<ScriptedVision>>) -> Router {
    let cfg = config();
    let vision = vision.map(|v| v as Arc<dyn VisionModel>);
    build_router(build_state(&cfg, index, vision))
}

fn multipart_request(uri: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn api_health_lists_problems() {
    let cfg = config();
    let resp = router(loaded_index(&cfg), None)
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["textbook_loaded"], true);
    assert_eq!(body["total_problems"], 2);
    assert_eq!(body["problem_numbers"], serde_json::json!(["12-1", "12-2"]));
}

#[tokio::test]
async fn analyze_uses_the_detected_section() {
    let cfg = config();
    let vision = ScriptedVision::new("12-2");
    let resp = router(loaded_index(&cfg), Some(vision.clone()))
        .oneshot(multipart_request("/api/analyze", "drawing.png", "image/png", b"\x89PNG"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["detected_problem"], "12-2");
    assert_eq!(body["context_used"], "specific_section");
    assert_eq!(body["filename"], "drawing.png");
    assert_eq!(body["problem_identification"], "Lamina");
    assert_eq!(body["construction_steps"][0]["instruction"], "i");

    let prompt = vision.analysis_prompt();
    assert!(prompt.contains("Problem 12-2 beta lamina."));
    assert!(!prompt.contains("alpha plate"));
    assert!(prompt.contains("(Problem 12-2)"));
}

#[tokio::test]
async fn analyze_falls_back_to_full_text() {
    let cfg = config();
    let vision = ScriptedVision::new("UNKNOWN");
    let resp = router(loaded_index(&cfg), Some(vision.clone()))
        .oneshot(multipart_request("/api/analyze", "drawing.jpg", "image/jpeg", b"jpeg"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["detected_problem"], Value::Null);
    assert_eq!(body["context_used"], "full_text");
    assert!(vision.analysis_prompt().contains(TEXTBOOK));
}

#[tokio::test]
async fn analyze_unknown_section_falls_back_to_full_text() {
    let cfg = config();
    let vision = ScriptedVision::new("Problem 12-9");
    let resp = router(loaded_index(&cfg), Some(vision.clone()))
        .oneshot(multipart_request("/api/analyze", "d.png", "image/png", b"png"))
        .await
        .unwrap();

    let body = json_body(resp).await;
    assert_eq!(body["detected_problem"], "12-9");
    assert_eq!(body["context_used"], "full_text");
}

#[tokio::test]
async fn analyze_rejects_other_file_types() {
    let cfg = config();
    let resp = router(loaded_index(&cfg), Some(ScriptedVision::new("12-1")))
        .oneshot(multipart_request("/api/analyze", "notes.txt", "text/plain", b"hi"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["detail"].as_str().unwrap().contains("text/plain"));
}

#[tokio::test]
async fn analyze_requires_a_loaded_textbook() {
    let cfg = config();
    let rule = SegmentRule::from_config(&cfg.textbook).unwrap();
    let index = Arc::new(SectionIndex::not_loaded(rule));
    let resp = router(index, Some(ScriptedVision::new("12-1")))
        .oneshot(multipart_request("/api/analyze", "d.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn analyze_without_vision_model_is_unavailable() {
    let cfg = config();
    let resp = router(loaded_index(&cfg), None)
        .oneshot(multipart_request("/api/analyze", "d.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn section_endpoint_normalizes_and_reports_misses() {
    let cfg = config();
    let app = router(loaded_index(&cfg), None);

    let resp = app.clone().oneshot(get("/api/textbook/sections/12.1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["problem"], "12-1");
    assert_eq!(body["text"], "Problem 12-1 alpha plate.");

    let resp = app.oneshot(get("/api/textbook/sections/12-9")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["detail"], "Problem 12-9 not found");
}

#[tokio::test]
async fn upload_rejects_unsupported_types() {
    let cfg = config();
    let resp = router(loaded_index(&cfg), None)
        .oneshot(multipart_request("/upload", "notes.txt", "text/plain", b"hello"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["detail"].as_str().unwrap().starts_with("Unsupported file type"));
}

#[tokio::test]
async fn textbook_status_reports_character_count() {
    let cfg = config();
    let resp = router(loaded_index(&cfg), None)
        .oneshot(get("/api/textbook/status"))
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["loaded"], true);
    assert_eq!(body["character_count"], TEXTBOOK.chars().count());
    assert_eq!(body["markers_found"], 2);
}

#[tokio::test]
async fn unreachable_vision_model_keeps_the_api_key_out_of_the_response() {
    let mut cfg = config();
    cfg.gemini.base_url = "http://127.0.0.1:1/v1beta".into();
    cfg.gemini.timeout_seconds = 5;
    let client = GeminiClient::new("SECRET-GEMINI-KEY".into(), &cfg.gemini).unwrap();
    let vision: Arc<dyn VisionModel> = Arc::new(client);
    let app = build_router(build_state(&cfg, loaded_index(&cfg), Some(vision)));

    let resp = app
        .oneshot(multipart_request("/api/analyze", "d.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["problem_identification"], "Error occurred");
    assert_eq!(body["context_used"], "full_text");
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("HTTP request failed"), "{error}");
    assert!(!body.to_string().contains("SECRET-GEMINI-KEY"));
}
