use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::types::{CreateSessionRequest, JoinSessionRequest, LeaveSessionRequest, SessionResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new session
///
/// POST /sessions
/// Returns session information with generated id and join code
#[instrument(name = "create_session", skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    info!(host_id = %request.host_id, "Creating new session");

    let session = state
        .session_service
        .create_session(request.host_id, request.host_name)
        .await?;

    Ok(Json(session))
}

/// HTTP handler for fetching session details
///
/// GET /sessions/:id
#[instrument(name = "get_session", skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session_service.session_details(&session_id).await?;
    Ok(Json(session))
}

/// HTTP handler for joining a session
///
/// POST /sessions/:id/join
#[instrument(name = "join_session", skip(state, request))]
pub async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    state
        .session_service
        .join_session(
            &session_id,
            request.player_id,
            request.player_name,
            request.spectator,
        )
        .await?;

    let session = state.session_service.session_details(&session_id).await?;
    Ok(Json(session))
}

/// HTTP handler for leaving a session
///
/// POST /sessions/:id/leave
#[instrument(name = "leave_session", skip(state, request))]
pub async fn leave_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<LeaveSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    state
        .session_service
        .leave_session(&session_id, &request.player_id)
        .await?;

    let session = state.session_service.session_details(&session_id).await?;
    Ok(Json(session))
}

/// HTTP handler for starting a session
///
/// POST /sessions/:id/start
#[instrument(name = "start_session", skip(state))]
pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session_service.start_session(&session_id).await?;
    Ok(Json(session))
}

/// HTTP handler for finalizing a session
///
/// POST /sessions/:id/finalize
/// Freezes the replay-derived standings into the final snapshot
#[instrument(name = "finalize_session", skip(state))]
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state.session_service.finalize_session(&session_id).await?;
    Ok(Json(session))
}

/// HTTP handler for administrative session deletion
///
/// DELETE /sessions/:id
#[instrument(name = "delete_session", skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.session_service.delete_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
