//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    ErrorResponse, HexagramResponse, MotionRequest, MotionResponse, PermissionAnswerResponse,
    PermissionRequest, SuccessResponse,
};
use super::AppState;
use crate::divination::HexagramCode;
use crate::runtime::{SessionSnapshot, SseEvent};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session snapshot and stream
        .route("/api/session", get(get_session))
        .route("/api/session/stream", get(stream_session))
        // Session commands
        .route("/api/session/start", post(start_session))
        .route("/api/session/toss", post(toss))
        .route("/api/session/reset", post(reset_session))
        // Sensor input from the browser
        .route("/api/motion", post(post_motion))
        .route("/api/permission", post(answer_permission))
        .route("/api/permission/revoke", post(revoke_permission))
        // Table lookup
        .route("/api/hexagrams/:code", get(get_hexagram))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.runtime.snapshot())
}

async fn stream_session(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe first so nothing published after the snapshot is missed
    let broadcast_rx = state.runtime.subscribe();
    let init_event = SseEvent::Init {
        snapshot: state.runtime.snapshot(),
    };
    sse_stream(init_event, broadcast_rx)
}

async fn start_session(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.runtime.start().await;
    Json(SuccessResponse::ok())
}

async fn toss(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.runtime.request_toss().await;
    Json(SuccessResponse::ok())
}

async fn reset_session(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.runtime.reset().await;
    Json(SuccessResponse::ok())
}

// ============================================================
// Sensor input
// ============================================================

async fn post_motion(
    State(state): State<AppState>,
    Json(req): Json<MotionRequest>,
) -> Json<MotionResponse> {
    let (x, y, z) = req.axes();
    let accepted = state.sensor.push(state.clock.sample(x, y, z));
    Json(MotionResponse { accepted })
}

async fn answer_permission(
    State(state): State<AppState>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<PermissionAnswerResponse>, AppError> {
    let permission = state.permission.as_ref().ok_or_else(|| {
        AppError::NotFound("Motion access is granted implicitly; nothing to answer".to_string())
    })?;
    let delivered = permission.answer(req.granted);
    tracing::info!(granted = req.granted, delivered, "Permission answer");
    Ok(Json(PermissionAnswerResponse { delivered }))
}

async fn revoke_permission(State(state): State<AppState>) -> Json<SuccessResponse> {
    state.runtime.revoke_permission().await;
    Json(SuccessResponse::ok())
}

// ============================================================
// Table lookup
// ============================================================

async fn get_hexagram(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<HexagramResponse>, AppError> {
    let code: HexagramCode = code
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid hexagram code: {e}")))?;
    Ok(Json(HexagramResponse {
        code,
        known: state.table.get(code).is_some(),
        entry: state.table.lookup(code).clone(),
    }))
}

async fn get_version() -> &'static str {
    concat!("cyber-divination ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
