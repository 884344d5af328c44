use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::scoring::Seat;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

/// Frozen per-seat result written exactly once when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSeatScore {
    pub player_id: String,
    pub player_name: String,
    pub points: i32,
}

pub type FinalScores = BTreeMap<Seat, FinalSeatScore>;

/// Database model for the sessions table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    /// Human-readable join code, generated pet name.
    pub code: String,
    pub status: SessionStatus,
    pub final_scores: Option<FinalScores>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionModel {
    /// Creates a new waiting session with generated id and join code.
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code: petname::Petnames::default().generate_one(2, "-"),
            status: SessionStatus::Waiting,
            final_scores: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

impl Default for SessionModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Database model for the occupants table.
///
/// Spectators carry no seat and no running counter. The running counter of a
/// seated occupant is a cache of the replay-derived total for that seat; the
/// round service repairs it whenever the two diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupantModel {
    pub session_id: String,
    pub player_id: String,
    pub player_name: String,
    pub seat: Option<Seat>,
    pub running_points: i32,
    pub is_spectator: bool,
}

/// Database model for the vacated_seats table, unique per (session, seat).
///
/// Written when a seated occupant leaves an active session so a later
/// occupant of the seat inherits the counter; deleted when someone takes the
/// seat over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacatedSeatModel {
    pub session_id: String,
    pub seat: Seat,
    pub player_id: String,
    pub player_name: String,
    pub running_points: i32,
}
