//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio runtime while the matrix refreshes on its
//! own threads. Handlers call straight into the shared [`LedMatrix`]: `draw`
//! and `shift` only swap a pointer, so nothing here blocks for long.
//!
//! ## Rust concepts
//! - `async fn` and `.await` for non-blocking I/O
//! - axum extractors: `State`, `Json`
//! - `Arc` for sharing the engine across async tasks
//! - `tower-http` middleware for CORS and request tracing

use crate::display::{DisplayState, DisplayStatus};
use crate::pattern::{self, PatternEntry};
use crate::{Grid, LedMatrix, MatrixError, PanelConfig};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub matrix: Arc<LedMatrix>,
    /// Directory holding pattern files (JSON grids and images)
    pub patterns_dir: PathBuf,
}

type ApiError = (StatusCode, String);

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        get_patterns,
        post_display_pattern,
        post_display_file,
        post_display_shift,
        post_display_clear,
    ),
    components(schemas(
        DisplayStatus,
        DisplayState,
        PanelConfig,
        PatternEntry,
        PatternRequest,
        FileRequest,
    )),
    tags(
        (name = "display", description = "Display control endpoints"),
        (name = "patterns", description = "Pattern discovery endpoints"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "Shift Matrix API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for drawing on a shift-register LED matrix"
    )
)]
pub struct ApiDoc;

// ── Request types ────────────────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct PatternRequest {
    /// Rows of 0/1 cells; must match the panel size exactly
    #[schema(value_type = Vec<Vec<u8>>, example = json!([[1, 0], [0, 1]]))]
    grid: Grid,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct FileRequest {
    /// Pattern file name relative to the patterns directory
    #[schema(example = "heart.json")]
    path: String,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(
                    utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
                        .validator_url("none"),
                ),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/patterns", get(get_patterns))
        .route("/api/v1/display/pattern", post(post_display_pattern))
        .route("/api/v1/display/file", post(post_display_file))
        .route("/api/v1/display/shift", post(post_display_shift))
        .route("/api/v1/display/clear", post(post_display_clear))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status — return current display state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current display status", body = DisplayStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<DisplayStatus> {
    Json(state.matrix.status())
}

/// GET /api/v1/patterns — list pattern files
#[utoipa::path(
    get,
    path = "/api/v1/patterns",
    tag = "patterns",
    responses(
        (status = 200, description = "Available pattern files", body = Vec<PatternEntry>)
    )
)]
async fn get_patterns(State(state): State<AppState>) -> Json<Vec<PatternEntry>> {
    Json(pattern::list_patterns(&state.patterns_dir))
}

/// POST /api/v1/display/pattern — draw a grid sent inline
#[utoipa::path(
    post,
    path = "/api/v1/display/pattern",
    tag = "display",
    request_body = PatternRequest,
    responses(
        (status = 200, description = "Pattern installed"),
        (status = 400, description = "Grid does not match the panel size")
    )
)]
async fn post_display_pattern(
    State(state): State<AppState>,
    Json(req): Json<PatternRequest>,
) -> Result<StatusCode, ApiError> {
    state.matrix.draw(req.grid).map_err(to_api_error)?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/display/file — draw a pattern file from the patterns directory
#[utoipa::path(
    post,
    path = "/api/v1/display/file",
    tag = "display",
    request_body = FileRequest,
    responses(
        (status = 200, description = "Pattern installed"),
        (status = 404, description = "Pattern file not found"),
        (status = 400, description = "Invalid path or unusable pattern")
    )
)]
async fn post_display_file(
    State(state): State<AppState>,
    Json(req): Json<FileRequest>,
) -> Result<StatusCode, ApiError> {
    let full_path = validate_pattern_path(&state.patterns_dir, &req.path)?;
    let panel = state.matrix.panel();

    // Image decoding is blocking work; keep it off the async workers.
    let grid = tokio::task::spawn_blocking(move || pattern::load_pattern(&full_path, panel))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(to_api_error)?;

    state.matrix.draw(grid).map_err(to_api_error)?;
    tracing::info!("Displaying pattern file: {}", req.path);
    Ok(StatusCode::OK)
}

/// POST /api/v1/display/shift — rotate the pattern one column right
#[utoipa::path(
    post,
    path = "/api/v1/display/shift",
    tag = "display",
    responses(
        (status = 200, description = "Pattern shifted"),
    )
)]
async fn post_display_shift(State(state): State<AppState>) -> StatusCode {
    state.matrix.shift();
    StatusCode::OK
}

/// POST /api/v1/display/clear — turn every pixel off
#[utoipa::path(
    post,
    path = "/api/v1/display/clear",
    tag = "display",
    responses(
        (status = 200, description = "Display cleared"),
    )
)]
async fn post_display_clear(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let panel = state.matrix.panel();
    let blank = Grid::blank(panel.rows, panel.cols).map_err(to_api_error)?;
    state.matrix.draw(blank).map_err(to_api_error)?;
    Ok(StatusCode::OK)
}

fn to_api_error(err: MatrixError) -> ApiError {
    let status = match &err {
        MatrixError::DimensionMismatch { .. } | MatrixError::Pattern(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

// ── Path validation ──────────────────────────────────────────────────

/// Validate that a requested path is within the patterns directory.
///
/// Both paths are canonicalized so `..` components cannot escape it.
fn validate_pattern_path(patterns_dir: &Path, relative_path: &str) -> Result<PathBuf, ApiError> {
    let full_path = patterns_dir.join(relative_path);

    let canonical = full_path.canonicalize().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            format!("Path not found: {relative_path}"),
        )
    })?;

    let canonical_dir = patterns_dir.canonicalize().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Patterns directory not found".to_string(),
        )
    })?;

    if !canonical.starts_with(&canonical_dir) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Path is outside the patterns directory".to_string(),
        ));
    }

    Ok(canonical)
}
