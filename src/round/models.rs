use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// How a round was won, which decides how points flow between seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WinKind {
    /// One player's discard caused the win; points flow loser to winner.
    DirectHit,
    /// Winner drew the winning tile; cost is split across the other seats.
    SelfDraw,
    /// Self-draw where a single responsible seat bears the entire cost.
    SelfDrawResponsibility,
}

impl WinKind {
    /// Direct hits and responsibility self-draws name a paying player;
    /// plain self-draws must not.
    pub fn requires_loser(&self) -> bool {
        matches!(self, WinKind::DirectHit | WinKind::SelfDrawResponsibility)
    }
}

/// A round waiting to be inserted; the repository assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewRound {
    pub session_id: String,
    pub winner_id: String,
    pub loser_id: Option<String>,
    pub win_kind: WinKind,
    pub fan_count: u8,
    /// Derived from the fan table at creation time and stored, never
    /// recomputed later.
    pub base_points: i32,
    pub patterns: Vec<String>,
}

/// Database model for the rounds table. Immutable once created except for
/// deletion through the round reverser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundModel {
    pub id: i64,
    pub session_id: String,
    pub winner_id: String,
    pub loser_id: Option<String>,
    pub win_kind: WinKind,
    pub fan_count: u8,
    pub base_points: i32,
    /// Opaque named hand-pattern identifiers; counted by the stats
    /// aggregator, never interpreted here.
    pub patterns: Vec<String>,
    pub created_at: DateTime<Utc>,
}
