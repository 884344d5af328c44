use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use super::types::{RecordRoundRequest, RoundResponse, SeatTotalsResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for recording a scoring event
///
/// POST /sessions/:id/rounds
/// The body's win_kind selects direct hit, self-draw or responsibility
/// self-draw semantics.
#[instrument(name = "record_round", skip(state, request))]
pub async fn record_round(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<RecordRoundRequest>,
) -> Result<Json<RoundResponse>, AppError> {
    let round = state.round_service.record_round(&session_id, request).await?;
    Ok(Json(round))
}

/// HTTP handler for deleting a scoring event and reversing its deltas
///
/// DELETE /sessions/:id/rounds/:round_id
#[instrument(name = "delete_round", skip(state))]
pub async fn delete_round(
    State(state): State<AppState>,
    Path((session_id, round_id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    state.round_service.reverse_round(&session_id, round_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// HTTP handler for the round history
///
/// GET /sessions/:id/rounds
#[instrument(name = "get_round_history", skip(state))]
pub async fn get_round_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<RoundResponse>>, AppError> {
    let rounds = state.round_service.round_history(&session_id).await?;
    Ok(Json(rounds))
}

/// HTTP handler for replay-derived seat totals
///
/// GET /sessions/:id/scores
#[instrument(name = "get_seat_totals", skip(state))]
pub async fn get_seat_totals(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SeatTotalsResponse>, AppError> {
    let totals = state.round_service.seat_totals(&session_id).await?;
    Ok(Json(totals))
}
