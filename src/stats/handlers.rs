use axum::{
    extract::{Path, State},
    Json,
};
use tracing::instrument;

use super::models::PlayerStatsModel;
use crate::shared::{AppError, AppState};

/// HTTP handler for fetching a player's lifetime stats
///
/// GET /players/:player_id/stats
#[instrument(name = "get_player_stats", skip(state))]
pub async fn get_player_stats(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<PlayerStatsModel>, AppError> {
    let stats = state
        .stats_service
        .get_player_stats(&player_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Player has no recorded stats".to_string()))?;

    Ok(Json(stats))
}
