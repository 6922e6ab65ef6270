use super::{error::ApiError, state::AppState};
use crate::{
    extract::Extraction,
    mentor::AnalyzeResponse,
    textbook::{IndexStatus, ProblemId},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

struct Upload {
    filename: String,
    content_type: String,
    bytes: Bytes,
}

/// Takes the multipart field named `file`.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), format!("Failed to read file: {e}")))?;
        info!("received {} ({}, {} bytes)", filename, content_type, bytes.len());
        return Ok(Upload {
            filename,
            content_type,
            bytes,
        });
    }
    Err(ApiError::bad_request("No file provided"))
}

// ── GET / ────────────────────────────────────────

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Engineering Drawing Mentor API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── GET /health ──────────────────────────────────

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let vision = state
        .mentor
        .as_ref()
        .map(|m| m.model_name().to_string())
        .unwrap_or_else(|| "not_configured".to_string());
    let textbook = if state.index.is_loaded() {
        "loaded"
    } else {
        "not_loaded"
    };
    Json(json!({
        "status": "healthy",
        "api": "drawing-mentor",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "pdf_processor": "operational",
            "image_processor": "operational",
            "textbook": textbook,
            "vision_model": vision,
        },
    }))
}

// ── GET /api/health ──────────────────────────────

#[derive(Serialize)]
pub struct TextbookHealth {
    pub status: &'static str,
    pub textbook_loaded: bool,
    pub total_problems: usize,
    pub problem_numbers: Vec<String>,
}

pub async fn api_health(State(state): State<AppState>) -> Json<TextbookHealth> {
    let status = state.index.status();
    Json(TextbookHealth {
        status: "healthy",
        textbook_loaded: status.loaded,
        total_problems: status.section_count,
        problem_numbers: status.identifiers,
    })
}

// ── GET /api/textbook/status ─────────────────────

pub async fn textbook_status(State(state): State<AppState>) -> Json<IndexStatus> {
    Json(state.index.status())
}

// ── GET /api/textbook/sections/{id} ──────────────

#[derive(Serialize)]
pub struct SectionResponse {
    pub problem: String,
    pub characters: usize,
    pub text: String,
}

pub async fn textbook_section(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SectionResponse>, ApiError> {
    if !state.index.is_loaded() {
        return Err(ApiError::unavailable("Textbook not loaded"));
    }
    let problem = ProblemId::normalize(&id, state.index.group());
    let text = state
        .index
        .get_section(&id)
        .ok_or_else(|| ApiError::not_found(format!("Problem {problem} not found")))?;
    Ok(Json(SectionResponse {
        problem: problem.to_string(),
        characters: text.chars().count(),
        text: text.to_string(),
    }))
}

// ── POST /api/analyze ────────────────────────────

pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mentor = state
        .mentor
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Vision model not configured"))?;
    let upload = read_upload(multipart).await?;
    let response = mentor
        .analyze(&upload.filename, &upload.content_type, &upload.bytes)
        .await?;
    Ok(Json(response))
}

// ── POST /upload ─────────────────────────────────

pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Extraction>, ApiError> {
    let upload = read_upload(multipart).await?;
    let extractor = state.extractor.clone();
    let extraction = tokio::task::spawn_blocking(move || {
        extractor.extract(&upload.filename, &upload.bytes)
    })
    .await
    .map_err(|e| ApiError::internal(format!("extraction task failed: {e}")))??;
    Ok(Json(extraction))
}
