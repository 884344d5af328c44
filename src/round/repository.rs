use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{NewRound, RoundModel, WinKind};
use crate::shared::AppError;

/// Trait for the append-only round ledger.
///
/// `list_rounds` always returns ledger creation order (creation timestamp,
/// ties broken by insertion sequence id) so replays and backfills are
/// deterministic.
#[async_trait]
pub trait RoundRepository: Send + Sync {
    /// Appends a round, assigning its sequence id and timestamp.
    async fn insert_round(&self, round: &NewRound) -> Result<RoundModel, AppError>;
    async fn get_round(&self, round_id: i64) -> Result<Option<RoundModel>, AppError>;
    async fn list_rounds(&self, session_id: &str) -> Result<Vec<RoundModel>, AppError>;
    /// Deletes a round; returns false when it was already gone.
    async fn delete_round(&self, round_id: i64) -> Result<bool, AppError>;
    async fn delete_session_rounds(&self, session_id: &str) -> Result<u64, AppError>;
}

/// In-memory implementation of RoundRepository for development and testing
pub struct InMemoryRoundRepository {
    rounds: Mutex<Vec<RoundModel>>,
    next_id: AtomicI64,
}

impl Default for InMemoryRoundRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoundRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rounds: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl RoundRepository for InMemoryRoundRepository {
    #[instrument(skip(self, round))]
    async fn insert_round(&self, round: &NewRound) -> Result<RoundModel, AppError> {
        let model = RoundModel {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            session_id: round.session_id.clone(),
            winner_id: round.winner_id.clone(),
            loser_id: round.loser_id.clone(),
            win_kind: round.win_kind,
            fan_count: round.fan_count,
            base_points: round.base_points,
            patterns: round.patterns.clone(),
            created_at: Utc::now(),
        };

        debug!(
            round_id = model.id,
            session_id = %model.session_id,
            win_kind = %model.win_kind,
            "Inserting round in memory"
        );

        let mut rounds = self.rounds.lock().unwrap();
        rounds.push(model.clone());
        Ok(model)
    }

    #[instrument(skip(self))]
    async fn get_round(&self, round_id: i64) -> Result<Option<RoundModel>, AppError> {
        let rounds = self.rounds.lock().unwrap();
        Ok(rounds.iter().find(|r| r.id == round_id).cloned())
    }

    #[instrument(skip(self))]
    async fn list_rounds(&self, session_id: &str) -> Result<Vec<RoundModel>, AppError> {
        let rounds = self.rounds.lock().unwrap();
        let mut session_rounds: Vec<RoundModel> = rounds
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        session_rounds.sort_by_key(|r| (r.created_at, r.id));
        Ok(session_rounds)
    }

    #[instrument(skip(self))]
    async fn delete_round(&self, round_id: i64) -> Result<bool, AppError> {
        let mut rounds = self.rounds.lock().unwrap();
        let before = rounds.len();
        rounds.retain(|r| r.id != round_id);
        Ok(rounds.len() != before)
    }

    #[instrument(skip(self))]
    async fn delete_session_rounds(&self, session_id: &str) -> Result<u64, AppError> {
        let mut rounds = self.rounds.lock().unwrap();
        let before = rounds.len();
        rounds.retain(|r| r.session_id != session_id);
        Ok((before - rounds.len()) as u64)
    }
}

/// PostgreSQL implementation of RoundRepository.
///
/// Expected table:
/// `rounds(id bigserial, session_id, winner_id, loser_id, win_kind,
/// fan_count, base_points, patterns, created_at)` with `patterns` stored as
/// JSON text.
pub struct PostgresRoundRepository {
    pool: PgPool,
}

impl PostgresRoundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn round_from_row(row: &sqlx::postgres::PgRow) -> Result<RoundModel, AppError> {
        let win_kind: String = row.get("win_kind");
        let fan_count: i16 = row.get("fan_count");
        let patterns: String = row.get("patterns");
        Ok(RoundModel {
            id: row.get("id"),
            session_id: row.get("session_id"),
            winner_id: row.get("winner_id"),
            loser_id: row.get("loser_id"),
            win_kind: win_kind
                .parse::<WinKind>()
                .map_err(|_| AppError::Database(format!("invalid win kind: {win_kind}")))?,
            fan_count: fan_count as u8,
            base_points: row.get("base_points"),
            patterns: serde_json::from_str(&patterns)
                .map_err(|e| AppError::Database(e.to_string()))?,
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl RoundRepository for PostgresRoundRepository {
    #[instrument(skip(self, round))]
    async fn insert_round(&self, round: &NewRound) -> Result<RoundModel, AppError> {
        let created_at = Utc::now();
        let patterns =
            serde_json::to_string(&round.patterns).map_err(|e| AppError::Database(e.to_string()))?;

        let row = sqlx::query(
            "INSERT INTO rounds (session_id, winner_id, loser_id, win_kind, fan_count, base_points, patterns, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(&round.session_id)
        .bind(&round.winner_id)
        .bind(&round.loser_id)
        .bind(round.win_kind.to_string())
        .bind(round.fan_count as i16)
        .bind(round.base_points)
        .bind(&patterns)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, session_id = %round.session_id, "Failed to insert round");
            AppError::Database(e.to_string())
        })?;

        Ok(RoundModel {
            id: row.get("id"),
            session_id: round.session_id.clone(),
            winner_id: round.winner_id.clone(),
            loser_id: round.loser_id.clone(),
            win_kind: round.win_kind,
            fan_count: round.fan_count,
            base_points: round.base_points,
            patterns: round.patterns.clone(),
            created_at,
        })
    }

    #[instrument(skip(self))]
    async fn get_round(&self, round_id: i64) -> Result<Option<RoundModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, session_id, winner_id, loser_id, win_kind, fan_count, base_points, patterns, created_at \
             FROM rounds WHERE id = $1",
        )
        .bind(round_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.as_ref().map(Self::round_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_rounds(&self, session_id: &str) -> Result<Vec<RoundModel>, AppError> {
        let rows = sqlx::query(
            "SELECT id, session_id, winner_id, loser_id, win_kind, fan_count, base_points, patterns, created_at \
             FROM rounds WHERE session_id = $1 ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.iter().map(Self::round_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn delete_round(&self, round_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM rounds WHERE id = $1")
            .bind(round_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, round_id, "Failed to delete round");
                AppError::Database(e.to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_session_rounds(&self, session_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM rounds WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
