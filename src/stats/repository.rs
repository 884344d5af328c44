use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use super::models::PlayerStatsModel;
use crate::shared::AppError;

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn get_player_stats(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerStatsModel>, AppError>;
    async fn upsert_player_stats(&self, stats: &PlayerStatsModel) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryStatsRepository {
    players: Arc<RwLock<HashMap<String, PlayerStatsModel>>>,
}

impl InMemoryStatsRepository {
    pub fn new() -> Self {
        Self {
            players: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl StatsRepository for InMemoryStatsRepository {
    async fn get_player_stats(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerStatsModel>, AppError> {
        let players = self.players.read().await;
        Ok(players.get(player_id).cloned())
    }

    async fn upsert_player_stats(&self, stats: &PlayerStatsModel) -> Result<(), AppError> {
        let mut players = self.players.write().await;
        players.insert(stats.player_id.clone(), stats.clone());
        Ok(())
    }
}

/// PostgreSQL implementation of StatsRepository.
///
/// Expected table: `player_stats(player_id, games, wins, self_draws,
/// direct_hit_wins, deal_ins, responsibility_payments, points_won,
/// points_lost, limit_hands, highest_fan, pattern_counts)` with
/// `pattern_counts` stored as JSON text.
pub struct PostgresStatsRepository {
    pool: PgPool,
}

impl PostgresStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatsRepository for PostgresStatsRepository {
    #[instrument(skip(self))]
    async fn get_player_stats(
        &self,
        player_id: &str,
    ) -> Result<Option<PlayerStatsModel>, AppError> {
        let row = sqlx::query(
            "SELECT player_id, games, wins, self_draws, direct_hit_wins, deal_ins, \
             responsibility_payments, points_won, points_lost, limit_hands, highest_fan, pattern_counts \
             FROM player_stats WHERE player_id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(|row| {
            let pattern_counts: String = row.get("pattern_counts");
            let highest_fan: i16 = row.get("highest_fan");
            Ok(PlayerStatsModel {
                player_id: row.get("player_id"),
                games: row.get::<i64, _>("games") as u32,
                wins: row.get::<i64, _>("wins") as u32,
                self_draws: row.get::<i64, _>("self_draws") as u32,
                direct_hit_wins: row.get::<i64, _>("direct_hit_wins") as u32,
                deal_ins: row.get::<i64, _>("deal_ins") as u32,
                responsibility_payments: row.get::<i64, _>("responsibility_payments") as u32,
                points_won: row.get("points_won"),
                points_lost: row.get("points_lost"),
                limit_hands: row.get::<i64, _>("limit_hands") as u32,
                highest_fan: highest_fan as u8,
                pattern_counts: serde_json::from_str(&pattern_counts)
                    .map_err(|e| AppError::Database(e.to_string()))?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self, stats))]
    async fn upsert_player_stats(&self, stats: &PlayerStatsModel) -> Result<(), AppError> {
        let pattern_counts = serde_json::to_string(&stats.pattern_counts)
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO player_stats (player_id, games, wins, self_draws, direct_hit_wins, deal_ins, \
             responsibility_payments, points_won, points_lost, limit_hands, highest_fan, pattern_counts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (player_id) DO UPDATE SET \
             games = $2, wins = $3, self_draws = $4, direct_hit_wins = $5, deal_ins = $6, \
             responsibility_payments = $7, points_won = $8, points_lost = $9, limit_hands = $10, \
             highest_fan = $11, pattern_counts = $12",
        )
        .bind(&stats.player_id)
        .bind(stats.games as i64)
        .bind(stats.wins as i64)
        .bind(stats.self_draws as i64)
        .bind(stats.direct_hit_wins as i64)
        .bind(stats.deal_ins as i64)
        .bind(stats.responsibility_payments as i64)
        .bind(stats.points_won)
        .bind(stats.points_lost)
        .bind(stats.limit_hands as i64)
        .bind(stats.highest_fan as i16)
        .bind(&pattern_counts)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, player_id = %stats.player_id, "Failed to upsert player stats");
            AppError::Database(e.to_string())
        })?;

        Ok(())
    }
}
