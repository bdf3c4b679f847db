// src/server.rs - HTTP upload endpoint
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{InvalidHeaderValue, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::evaluator::EvaluationResult;
use crate::mediapipe_bridge::DetectorFactory;
use crate::session::run_session;
use crate::video::{BestEffortSink, FrameSink, VideoFileReader, VideoFileWriter};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Multipart field that carries the video.
const VIDEO_FIELD: &str = "video";

/// State shared by all handlers. Only immutable configuration is shared;
/// every request builds its own detector, reader and writer.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnalysisConfig>,
    pub detectors: Arc<dyn DetectorFactory>,
    pub debug_video: Option<Arc<PathBuf>>,
    pub upload_dir: Arc<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no video file provided")]
    NoFile,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NoFile => (StatusCode::BAD_REQUEST, "NO_FILE", self.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Analysis(err) => match err {
                AnalysisError::InputUnavailable(msg) => {
                    (StatusCode::BAD_REQUEST, "INPUT_UNAVAILABLE", msg.clone())
                }
                AnalysisError::NoDetection => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "NO_POSES_DETECTED",
                    err.to_string(),
                ),
                AnalysisError::UntrackableHip => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "HIP_NOT_TRACKABLE",
                    err.to_string(),
                ),
                other => {
                    tracing::error!(error = %other, "analysis failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// An uploaded video on disk, removed when dropped.
struct TempUpload {
    id: Uuid,
    path: PathBuf,
}

impl TempUpload {
    fn new(dir: &Path) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            path: dir.join(format!("squat_upload_{id}.mp4")),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Per-request debug video path: `clip.mp4` becomes `clip_<id>.mp4`.
pub fn debug_video_path(base: &Path, id: Uuid) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "debug".into());
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{id}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{id}.mp4"),
    };
    base.with_file_name(name)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn index() -> Html<&'static str> {
    Html("<h1>Squat form coach API</h1><p>The server is running.</p>")
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn receive_video(multipart: &mut Multipart, dir: &Path) -> ApiResult<TempUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        if field.file_name().map_or(true, str::is_empty) {
            return Err(ApiError::NoFile);
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let upload = TempUpload::new(dir);
        tokio::fs::write(upload.path(), &data)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")))?;
        tracing::info!(bytes = data.len(), "video received");
        return Ok(upload);
    }
    Err(ApiError::NoFile)
}

fn analyse_upload(upload: &TempUpload, state: &AppState) -> Result<EvaluationResult, AnalysisError> {
    let reader = VideoFileReader::open(upload.path()).map_err(AnalysisError::from_open)?;
    let mut detector = state.detectors.create()?;

    let writer = state.debug_video.as_deref().and_then(|base| {
        let path = debug_video_path(base, upload.id);
        let info = reader.info();
        VideoFileWriter::create(&path, info.width, info.height, info.fps)
            .map_err(|e| tracing::warn!(error = %e, path = %path.display(), "debug video disabled"))
            .ok()
    });
    let mut debug_sink = BestEffortSink::new(writer);

    let outcome = run_session(
        reader,
        &mut *detector,
        Some(&mut debug_sink as &mut dyn FrameSink),
        &state.config,
    );

    if let Some(writer) = debug_sink.into_inner() {
        if let Err(e) = writer.finish() {
            tracing::warn!(error = %e, "debug video was not written");
        }
    }

    let (_, result) = outcome?;
    Ok(result)
}

async fn analyse_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<EvaluationResult>> {
    let upload = receive_video(&mut multipart, &state.upload_dir).await?;

    let result = tokio::task::spawn_blocking(move || analyse_upload(&upload, &state))
        .await
        .map_err(|e| ApiError::Internal(format!("analysis task failed: {e}")))??;

    Ok(Json(result))
}

/// CORS for browser front ends. A `*` entry allows any origin.
pub fn build_cors_layer(origins: &[String]) -> Result<CorsLayer, InvalidHeaderValue> {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600)))
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/analyse", post(analyse_video))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
