use serde::{Deserialize, Serialize};

use super::models::{FinalScores, SessionStatus};
use crate::scoring::Seat;
use chrono::{DateTime, Utc};

/// Request payload for creating a new session; the host is seated
/// immediately.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub host_id: String,
    pub host_name: String,
}

/// Request payload for joining a session
#[derive(Debug, Deserialize)]
pub struct JoinSessionRequest {
    pub player_id: String,
    pub player_name: String,
    #[serde(default)]
    pub spectator: bool,
}

/// Request payload for leaving a session
#[derive(Debug, Deserialize)]
pub struct LeaveSessionRequest {
    pub player_id: String,
}

/// One occupant as exposed over the API
#[derive(Debug, Serialize, Deserialize)]
pub struct OccupantResponse {
    pub player_id: String,
    pub player_name: String,
    pub seat: Option<Seat>,
    pub running_points: i32,
    pub is_spectator: bool,
}

/// Response for session creation and session information
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub code: String,
    pub status: SessionStatus,
    pub occupants: Vec<OccupantResponse>,
    pub final_scores: Option<FinalScores>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}
