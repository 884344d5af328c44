use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fan count from which a hand counts as a limit hand.
pub const LIMIT_HAND_FAN: u8 = 10;

/// Lifetime cumulative counters for one player identity, independent of any
/// single session. Created lazily on first participation and only ever
/// incremented by normal play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatsModel {
    pub player_id: String,
    pub games: u32,
    pub wins: u32,
    pub self_draws: u32,
    pub direct_hit_wins: u32,
    pub deal_ins: u32,
    pub responsibility_payments: u32,
    pub points_won: i64,
    pub points_lost: i64,
    pub limit_hands: u32,
    pub highest_fan: u8,
    /// Occurrence count per named hand-pattern identifier.
    pub pattern_counts: BTreeMap<String, u32>,
}

impl PlayerStatsModel {
    pub fn new(player_id: String) -> Self {
        Self {
            player_id,
            games: 0,
            wins: 0,
            self_draws: 0,
            direct_hit_wins: 0,
            deal_ins: 0,
            responsibility_payments: 0,
            points_won: 0,
            points_lost: 0,
            limit_hands: 0,
            highest_fan: 0,
            pattern_counts: BTreeMap::new(),
        }
    }
}
