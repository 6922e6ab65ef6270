//! HTTP surface: router construction, startup wiring and the serve loop.

pub mod error;
pub mod handlers;
pub mod state;

use crate::{
    config::Config,
    engine::{pdf::PdfExtractEngine, tesseract::TesseractEngine},
    extract::Extractor,
    mentor::Mentor,
    textbook::{SectionIndex, SegmentRule},
    vision::{GeminiClient, VisionModel},
};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub use error::ApiError;
pub use state::AppState;

/// Loads the textbook and wires the collaborators. Runs once, before serving.
///
/// A textbook that fails to load or a missing Gemini key degrade the
/// service instead of aborting startup.
pub fn startup(cfg: &Config) -> Result<AppState> {
    let rule = SegmentRule::from_config(&cfg.textbook)?;
    let index = Arc::new(SectionIndex::load(
        Path::new(&cfg.textbook.pdf_path),
        rule,
        &PdfExtractEngine,
    ));
    if !index.is_loaded() {
        warn!("textbook failed to load; /api/analyze will answer 503");
    }

    let vision: Option<Arc<dyn VisionModel>> = match GeminiClient::from_env(&cfg.gemini) {
        Ok(client) => {
            info!("vision model: {}", client.name());
            Some(Arc::new(client))
        }
        Err(err) => {
            warn!("vision model unavailable: {err}");
            None
        }
    };

    Ok(build_state(cfg, index, vision))
}

pub fn build_state(
    cfg: &Config,
    index: Arc<SectionIndex>,
    vision: Option<Arc<dyn VisionModel>>,
) -> AppState {
    let extractor = Extractor::new(
        cfg,
        Arc::new(PdfExtractEngine),
        Arc::new(TesseractEngine::new(cfg)),
    );
    AppState {
        cfg: Arc::new(cfg.clone()),
        mentor: vision.map(|v| Mentor::new(index.clone(), v)),
        index,
        extractor,
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cfg.server.allowed_origins);
    let body_limit = state.cfg.server.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::api_health))
        .route("/api/textbook/status", get(handlers::textbook_status))
        .route("/api/textbook/sections/{id}", get(handlers::textbook_section))
        .route("/api/analyze", post(handlers::analyze))
        .route("/upload", post(handlers::upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid CORS origin: {o}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "serving HTTP")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}
