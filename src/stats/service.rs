use std::sync::Arc;

use tracing::{debug, instrument};

use super::models::{PlayerStatsModel, LIMIT_HAND_FAN};
use super::repository::StatsRepository;
use crate::round::models::{RoundModel, WinKind};
use crate::session::models::OccupantModel;
use crate::shared::AppError;

/// Lifetime stats aggregator.
///
/// Applied once per seated occupant per recorded round. Deliberately not
/// invoked by the round reverser: deleting a round corrects the score, the
/// lifetime stats keep the original outcome (observed behavior of the system
/// this one replaces; pinned by tests).
pub struct StatsService {
    repository: Arc<dyn StatsRepository>,
}

impl StatsService {
    pub fn new(repository: Arc<dyn StatsRepository>) -> Self {
        Self { repository }
    }

    /// Updates lifetime counters for every seated occupant of the session a
    /// round was just recorded in.
    #[instrument(skip(self, occupants, round), fields(round_id = round.id))]
    pub async fn apply_round(
        &self,
        occupants: &[OccupantModel],
        round: &RoundModel,
    ) -> Result<(), AppError> {
        for occupant in occupants
            .iter()
            .filter(|o| !o.is_spectator && o.seat.is_some())
        {
            let mut stats = self
                .repository
                .get_player_stats(&occupant.player_id)
                .await?
                .unwrap_or_else(|| PlayerStatsModel::new(occupant.player_id.clone()));

            apply_round_to_stats(&mut stats, round, &occupant.player_id);

            self.repository.upsert_player_stats(&stats).await?;
            debug!(player_id = %occupant.player_id, games = stats.games, "Updated lifetime stats");
        }
        Ok(())
    }

    pub async fn get_player_stats(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerStatsModel>, AppError> {
        self.repository.get_player_stats(player_id).await
    }
}

/// Folds one round into a player's lifetime counters.
///
/// Every participant gains a game. The winner gains win counters, fan-weighted
/// totals and pattern frequencies; a direct-hit loser a deal-in; a
/// responsibility payer the full self-draw payout as a loss; plain self-draw
/// bystanders the half share as a loss with no counter beyond games.
fn apply_round_to_stats(stats: &mut PlayerStatsModel, round: &RoundModel, player_id: &str) {
    let half = round.base_points / 2;
    stats.games += 1;

    if round.winner_id == player_id {
        stats.wins += 1;
        match round.win_kind {
            WinKind::DirectHit => {
                stats.direct_hit_wins += 1;
                stats.points_won += round.base_points as i64;
            }
            WinKind::SelfDraw | WinKind::SelfDrawResponsibility => {
                stats.self_draws += 1;
                stats.points_won += (3 * half) as i64;
            }
        }
        if round.fan_count >= LIMIT_HAND_FAN {
            stats.limit_hands += 1;
        }
        stats.highest_fan = stats.highest_fan.max(round.fan_count);
        for pattern in &round.patterns {
            *stats.pattern_counts.entry(pattern.clone()).or_insert(0) += 1;
        }
    } else if round.loser_id.as_deref() == Some(player_id) {
        match round.win_kind {
            WinKind::DirectHit => {
                stats.deal_ins += 1;
                stats.points_lost += round.base_points as i64;
            }
            WinKind::SelfDrawResponsibility => {
                stats.responsibility_payments += 1;
                stats.points_lost += (3 * half) as i64;
            }
            // A plain self-draw never names a loser; unreachable for valid
            // ledger data.
            WinKind::SelfDraw => {}
        }
    } else if round.win_kind == WinKind::SelfDraw {
        // Bystander share of a plain self-draw.
        stats.points_lost += half as i64;
    }
}
