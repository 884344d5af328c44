use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{RoundModel, WinKind};
use crate::scoring::{Seat, SeatDelta, SeatMap, SeatTotals};

/// Request payload for recording a scoring event
#[derive(Debug, Deserialize)]
pub struct RecordRoundRequest {
    pub winner_id: String,
    /// Loser for a direct hit, responsible player for a responsibility
    /// self-draw; must be absent for a plain self-draw.
    pub loser_id: Option<String>,
    pub win_kind: WinKind,
    pub fan_count: u8,
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// One ledger entry as exposed over the API, including the per-seat point
/// movement it caused.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoundResponse {
    pub id: i64,
    pub session_id: String,
    pub winner_id: String,
    pub loser_id: Option<String>,
    pub win_kind: WinKind,
    pub fan_count: u8,
    pub base_points: i32,
    pub patterns: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub deltas: SeatDelta,
}

impl RoundResponse {
    pub fn from_model(round: RoundModel, seat_map: &SeatMap) -> Self {
        let deltas = crate::scoring::compute_round_delta(&round, seat_map);
        Self {
            id: round.id,
            session_id: round.session_id,
            winner_id: round.winner_id,
            loser_id: round.loser_id,
            win_kind: round.win_kind,
            fan_count: round.fan_count,
            base_points: round.base_points,
            patterns: round.patterns,
            created_at: round.created_at,
            deltas,
        }
    }
}

/// Replay-derived standing of one seat
#[derive(Debug, Serialize, Deserialize)]
pub struct SeatStanding {
    pub seat: Seat,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub points: i32,
}

/// Response for the seat totals endpoint; always replay-derived, never the
/// persisted counters.
#[derive(Debug, Serialize, Deserialize)]
pub struct SeatTotalsResponse {
    pub session_id: String,
    pub totals: SeatTotals,
    pub standings: Vec<SeatStanding>,
}
