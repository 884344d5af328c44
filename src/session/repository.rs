use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{OccupantModel, SessionModel, VacatedSeatModel};
use crate::scoring::Seat;
use crate::shared::AppError;

/// Trait for session, occupancy and vacated-seat storage.
///
/// Running point counters live here; they are mutated only through the
/// delta/set methods so the round service can treat them as a cache of the
/// replay totals.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &SessionModel) -> Result<(), AppError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionModel>, AppError>;
    async fn update_session(&self, session: &SessionModel) -> Result<(), AppError>;
    /// Deletes the session together with its occupants and vacated seats.
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError>;

    async fn insert_occupant(&self, occupant: &OccupantModel) -> Result<(), AppError>;
    async fn get_occupants(&self, session_id: &str) -> Result<Vec<OccupantModel>, AppError>;
    async fn get_occupant(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Option<OccupantModel>, AppError>;
    async fn remove_occupant(&self, session_id: &str, player_id: &str) -> Result<(), AppError>;
    /// Adds a signed delta to an occupant's running counter, returning the
    /// new value.
    async fn apply_points_delta(
        &self,
        session_id: &str,
        player_id: &str,
        delta: i32,
    ) -> Result<i32, AppError>;
    /// Overwrites an occupant's running counter (drift repair).
    async fn set_running_points(
        &self,
        session_id: &str,
        player_id: &str,
        points: i32,
    ) -> Result<(), AppError>;

    /// Inserts or replaces the vacated record for the record's seat.
    async fn upsert_vacated_seat(&self, record: &VacatedSeatModel) -> Result<(), AppError>;
    async fn get_vacated_seats(&self, session_id: &str) -> Result<Vec<VacatedSeatModel>, AppError>;
    /// Removes and returns the vacated record for a seat, if any.
    async fn remove_vacated_seat(
        &self,
        session_id: &str,
        seat: Seat,
    ) -> Result<Option<VacatedSeatModel>, AppError>;
    async fn apply_vacated_points_delta(
        &self,
        session_id: &str,
        seat: Seat,
        delta: i32,
    ) -> Result<i32, AppError>;
    async fn set_vacated_points(
        &self,
        session_id: &str,
        seat: Seat,
        points: i32,
    ) -> Result<(), AppError>;
}

/// In-memory implementation of SessionRepository for development and testing
///
/// This provides a realistic implementation that can be used in development
/// without requiring a real database connection. Data is stored in memory
/// and will be lost when the application restarts.
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, SessionModel>>,
    occupants: Mutex<Vec<OccupantModel>>,
    vacated: Mutex<Vec<VacatedSeatModel>>,
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            occupants: Mutex::new(Vec::new()),
            vacated: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    #[instrument(skip(self, session))]
    async fn create_session(&self, session: &SessionModel) -> Result<(), AppError> {
        debug!(session_id = %session.id, code = %session.code, "Creating session in memory");

        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session.id) {
            warn!(session_id = %session.id, "Session already exists in memory");
            return Err(AppError::Database("Session already exists".to_string()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionModel>, AppError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.get(session_id).cloned())
    }

    #[instrument(skip(self, session))]
    async fn update_session(&self, session: &SessionModel) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session.id) {
            warn!(session_id = %session.id, "Session not found for update in memory");
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(session_id).is_none() {
            warn!(session_id = %session_id, "Session not found for deletion in memory");
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        drop(sessions);

        self.occupants
            .lock()
            .unwrap()
            .retain(|occupant| occupant.session_id != session_id);
        self.vacated
            .lock()
            .unwrap()
            .retain(|record| record.session_id != session_id);
        Ok(())
    }

    #[instrument(skip(self, occupant))]
    async fn insert_occupant(&self, occupant: &OccupantModel) -> Result<(), AppError> {
        debug!(
            session_id = %occupant.session_id,
            player_id = %occupant.player_id,
            seat = ?occupant.seat,
            "Inserting occupant in memory"
        );

        let mut occupants = self.occupants.lock().unwrap();
        if occupants
            .iter()
            .any(|o| o.session_id == occupant.session_id && o.player_id == occupant.player_id)
        {
            warn!(player_id = %occupant.player_id, "Occupant already exists in memory");
            return Err(AppError::Database("Occupant already exists".to_string()));
        }
        occupants.push(occupant.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_occupants(&self, session_id: &str) -> Result<Vec<OccupantModel>, AppError> {
        let occupants = self.occupants.lock().unwrap();
        Ok(occupants
            .iter()
            .filter(|o| o.session_id == session_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_occupant(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Option<OccupantModel>, AppError> {
        let occupants = self.occupants.lock().unwrap();
        Ok(occupants
            .iter()
            .find(|o| o.session_id == session_id && o.player_id == player_id)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn remove_occupant(&self, session_id: &str, player_id: &str) -> Result<(), AppError> {
        let mut occupants = self.occupants.lock().unwrap();
        let before = occupants.len();
        occupants.retain(|o| !(o.session_id == session_id && o.player_id == player_id));
        if occupants.len() == before {
            warn!(player_id = %player_id, "Occupant not found for removal in memory");
            return Err(AppError::NotFound("Occupant not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply_points_delta(
        &self,
        session_id: &str,
        player_id: &str,
        delta: i32,
    ) -> Result<i32, AppError> {
        let mut occupants = self.occupants.lock().unwrap();
        let occupant = occupants
            .iter_mut()
            .find(|o| o.session_id == session_id && o.player_id == player_id)
            .ok_or_else(|| AppError::NotFound("Occupant not found".to_string()))?;
        occupant.running_points += delta;
        debug!(
            player_id = %player_id,
            delta,
            running_points = occupant.running_points,
            "Applied points delta in memory"
        );
        Ok(occupant.running_points)
    }

    #[instrument(skip(self))]
    async fn set_running_points(
        &self,
        session_id: &str,
        player_id: &str,
        points: i32,
    ) -> Result<(), AppError> {
        let mut occupants = self.occupants.lock().unwrap();
        let occupant = occupants
            .iter_mut()
            .find(|o| o.session_id == session_id && o.player_id == player_id)
            .ok_or_else(|| AppError::NotFound("Occupant not found".to_string()))?;
        occupant.running_points = points;
        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn upsert_vacated_seat(&self, record: &VacatedSeatModel) -> Result<(), AppError> {
        debug!(
            session_id = %record.session_id,
            seat = record.seat,
            player_id = %record.player_id,
            running_points = record.running_points,
            "Upserting vacated seat in memory"
        );

        let mut vacated = self.vacated.lock().unwrap();
        vacated.retain(|v| !(v.session_id == record.session_id && v.seat == record.seat));
        vacated.push(record.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_vacated_seats(&self, session_id: &str) -> Result<Vec<VacatedSeatModel>, AppError> {
        let vacated = self.vacated.lock().unwrap();
        Ok(vacated
            .iter()
            .filter(|v| v.session_id == session_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn remove_vacated_seat(
        &self,
        session_id: &str,
        seat: Seat,
    ) -> Result<Option<VacatedSeatModel>, AppError> {
        let mut vacated = self.vacated.lock().unwrap();
        let position = vacated
            .iter()
            .position(|v| v.session_id == session_id && v.seat == seat);
        Ok(position.map(|index| vacated.swap_remove(index)))
    }

    #[instrument(skip(self))]
    async fn apply_vacated_points_delta(
        &self,
        session_id: &str,
        seat: Seat,
        delta: i32,
    ) -> Result<i32, AppError> {
        let mut vacated = self.vacated.lock().unwrap();
        let record = vacated
            .iter_mut()
            .find(|v| v.session_id == session_id && v.seat == seat)
            .ok_or_else(|| AppError::NotFound("Vacated seat not found".to_string()))?;
        record.running_points += delta;
        Ok(record.running_points)
    }

    #[instrument(skip(self))]
    async fn set_vacated_points(
        &self,
        session_id: &str,
        seat: Seat,
        points: i32,
    ) -> Result<(), AppError> {
        let mut vacated = self.vacated.lock().unwrap();
        let record = vacated
            .iter_mut()
            .find(|v| v.session_id == session_id && v.seat == seat)
            .ok_or_else(|| AppError::NotFound("Vacated seat not found".to_string()))?;
        record.running_points = points;
        Ok(())
    }
}

/// PostgreSQL implementation of SessionRepository.
///
/// Expected tables:
/// - `sessions(id, code, status, final_scores, created_at, started_at, ended_at)`
/// - `occupants(session_id, player_id, player_name, seat, running_points, is_spectator)`
///   unique on (session_id, player_id)
/// - `vacated_seats(session_id, seat, player_id, player_name, running_points)`
///   unique on (session_id, seat)
///
/// JSON-ish columns (`final_scores`) are stored as text.
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<SessionModel, AppError> {
        let status: String = row.get("status");
        let final_scores: Option<String> = row.get("final_scores");
        Ok(SessionModel {
            id: row.get("id"),
            code: row.get("code"),
            status: status
                .parse()
                .map_err(|_| AppError::Database(format!("invalid session status: {status}")))?,
            final_scores: final_scores
                .map(|text| serde_json::from_str(&text))
                .transpose()
                .map_err(|e| AppError::Database(e.to_string()))?,
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            ended_at: row.get("ended_at"),
        })
    }

    fn occupant_from_row(row: &sqlx::postgres::PgRow) -> OccupantModel {
        let seat: Option<i16> = row.get("seat");
        OccupantModel {
            session_id: row.get("session_id"),
            player_id: row.get("player_id"),
            player_name: row.get("player_name"),
            seat: seat.map(|s| s as Seat),
            running_points: row.get("running_points"),
            is_spectator: row.get("is_spectator"),
        }
    }

    fn vacated_from_row(row: &sqlx::postgres::PgRow) -> VacatedSeatModel {
        let seat: i16 = row.get("seat");
        VacatedSeatModel {
            session_id: row.get("session_id"),
            seat: seat as Seat,
            player_id: row.get("player_id"),
            player_name: row.get("player_name"),
            running_points: row.get("running_points"),
        }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    #[instrument(skip(self, session))]
    async fn create_session(&self, session: &SessionModel) -> Result<(), AppError> {
        let final_scores = session
            .final_scores
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query(
            "INSERT INTO sessions (id, code, status, final_scores, created_at, started_at, ended_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&session.id)
        .bind(&session.code)
        .bind(session.status.to_string())
        .bind(final_scores)
        .bind(session.created_at)
        .bind(session.started_at)
        .bind(session.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create session in database");
            AppError::Database(e.to_string())
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, code, status, final_scores, created_at, started_at, ended_at \
             FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, session_id = %session_id, "Failed to fetch session from database");
            AppError::Database(e.to_string())
        })?;

        row.as_ref().map(Self::session_from_row).transpose()
    }

    #[instrument(skip(self, session))]
    async fn update_session(&self, session: &SessionModel) -> Result<(), AppError> {
        let final_scores = session
            .final_scores
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE sessions SET code = $2, status = $3, final_scores = $4, started_at = $5, ended_at = $6 \
             WHERE id = $1",
        )
        .bind(&session.id)
        .bind(&session.code)
        .bind(session.status.to_string())
        .bind(final_scores)
        .bind(session.started_at)
        .bind(session.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, session_id = %session.id, "Failed to update session in database");
            AppError::Database(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            warn!(session_id = %session.id, "Session not found for update");
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM occupants WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        sqlx::query("DELETE FROM vacated_seats WHERE session_id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Session not found".to_string()));
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, occupant))]
    async fn insert_occupant(&self, occupant: &OccupantModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO occupants (session_id, player_id, player_name, seat, running_points, is_spectator) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&occupant.session_id)
        .bind(&occupant.player_id)
        .bind(&occupant.player_name)
        .bind(occupant.seat.map(|s| s as i16))
        .bind(occupant.running_points)
        .bind(occupant.is_spectator)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, player_id = %occupant.player_id, "Failed to insert occupant");
            AppError::Database(e.to_string())
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_occupants(&self, session_id: &str) -> Result<Vec<OccupantModel>, AppError> {
        let rows = sqlx::query(
            "SELECT session_id, player_id, player_name, seat, running_points, is_spectator \
             FROM occupants WHERE session_id = $1 ORDER BY seat NULLS LAST, player_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::occupant_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn get_occupant(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Option<OccupantModel>, AppError> {
        let row = sqlx::query(
            "SELECT session_id, player_id, player_name, seat, running_points, is_spectator \
             FROM occupants WHERE session_id = $1 AND player_id = $2",
        )
        .bind(session_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::occupant_from_row))
    }

    #[instrument(skip(self))]
    async fn remove_occupant(&self, session_id: &str, player_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM occupants WHERE session_id = $1 AND player_id = $2")
            .bind(session_id)
            .bind(player_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Occupant not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply_points_delta(
        &self,
        session_id: &str,
        player_id: &str,
        delta: i32,
    ) -> Result<i32, AppError> {
        let row = sqlx::query(
            "UPDATE occupants SET running_points = running_points + $3 \
             WHERE session_id = $1 AND player_id = $2 RETURNING running_points",
        )
        .bind(session_id)
        .bind(player_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, player_id = %player_id, "Failed to apply points delta");
            AppError::Database(e.to_string())
        })?
        .ok_or_else(|| AppError::NotFound("Occupant not found".to_string()))?;

        Ok(row.get("running_points"))
    }

    #[instrument(skip(self))]
    async fn set_running_points(
        &self,
        session_id: &str,
        player_id: &str,
        points: i32,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE occupants SET running_points = $3 WHERE session_id = $1 AND player_id = $2",
        )
        .bind(session_id)
        .bind(player_id)
        .bind(points)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Occupant not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn upsert_vacated_seat(&self, record: &VacatedSeatModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO vacated_seats (session_id, seat, player_id, player_name, running_points) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (session_id, seat) DO UPDATE \
             SET player_id = $3, player_name = $4, running_points = $5",
        )
        .bind(&record.session_id)
        .bind(record.seat as i16)
        .bind(&record.player_id)
        .bind(&record.player_name)
        .bind(record.running_points)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, seat = record.seat, "Failed to upsert vacated seat");
            AppError::Database(e.to_string())
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_vacated_seats(&self, session_id: &str) -> Result<Vec<VacatedSeatModel>, AppError> {
        let rows = sqlx::query(
            "SELECT session_id, seat, player_id, player_name, running_points \
             FROM vacated_seats WHERE session_id = $1 ORDER BY seat",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.iter().map(Self::vacated_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn remove_vacated_seat(
        &self,
        session_id: &str,
        seat: Seat,
    ) -> Result<Option<VacatedSeatModel>, AppError> {
        let row = sqlx::query(
            "DELETE FROM vacated_seats WHERE session_id = $1 AND seat = $2 \
             RETURNING session_id, seat, player_id, player_name, running_points",
        )
        .bind(session_id)
        .bind(seat as i16)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(row.as_ref().map(Self::vacated_from_row))
    }

    #[instrument(skip(self))]
    async fn apply_vacated_points_delta(
        &self,
        session_id: &str,
        seat: Seat,
        delta: i32,
    ) -> Result<i32, AppError> {
        let row = sqlx::query(
            "UPDATE vacated_seats SET running_points = running_points + $3 \
             WHERE session_id = $1 AND seat = $2 RETURNING running_points",
        )
        .bind(session_id)
        .bind(seat as i16)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::NotFound("Vacated seat not found".to_string()))?;

        Ok(row.get("running_points"))
    }

    #[instrument(skip(self))]
    async fn set_vacated_points(
        &self,
        session_id: &str,
        seat: Seat,
        points: i32,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE vacated_seats SET running_points = $3 WHERE session_id = $1 AND seat = $2",
        )
        .bind(session_id)
        .bind(seat as i16)
        .bind(points)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Vacated seat not found".to_string()));
        }
        Ok(())
    }
}
