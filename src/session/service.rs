use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use super::models::{
    FinalScores, FinalSeatScore, OccupantModel, SessionModel, SessionStatus, VacatedSeatModel,
};
use super::repository::SessionRepository;
use super::types::{OccupantResponse, SessionResponse};
use crate::event::{EventBus, SessionEvent};
use crate::round::repository::RoundRepository;
use crate::scoring::{compute_seat_totals, resolve_seat_map, Seat, SEATS};
use crate::shared::AppError;

/// Session lifecycle controller.
///
/// Owns seat occupancy transitions: join, leave-with-vacancy,
/// rejoin-with-inherited-points and finalize-with-snapshot. All of these feed
/// the seat map resolver, which is why the rules here are deliberately
/// conservative about when vacated records appear and disappear.
pub struct SessionService {
    repository: Arc<dyn SessionRepository>,
    round_repository: Arc<dyn RoundRepository>,
    event_bus: EventBus,
}

impl SessionService {
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        round_repository: Arc<dyn RoundRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            round_repository,
            event_bus,
        }
    }

    /// Creates a new waiting session and seats the host.
    #[instrument(skip(self))]
    pub async fn create_session(
        &self,
        host_id: String,
        host_name: String,
    ) -> Result<SessionResponse, AppError> {
        let session = SessionModel::new();
        debug!(session_id = %session.id, code = %session.code, "Generated session");

        self.repository.create_session(&session).await?;
        self.join_session(&session.id, host_id, host_name, false)
            .await?;

        info!(session_id = %session.id, code = %session.code, "Session created");
        self.session_details(&session.id).await
    }

    /// Gets session details as a response object for API endpoints
    #[instrument(skip(self))]
    pub async fn session_details(&self, session_id: &str) -> Result<SessionResponse, AppError> {
        let session = self.require_session(session_id).await?;
        let occupants = self.repository.get_occupants(session_id).await?;

        Ok(SessionResponse {
            id: session.id,
            code: session.code,
            status: session.status,
            occupants: occupants
                .into_iter()
                .map(|o| OccupantResponse {
                    player_id: o.player_id,
                    player_name: o.player_name,
                    seat: o.seat,
                    running_points: o.running_points,
                    is_spectator: o.is_spectator,
                })
                .collect(),
            final_scores: session.final_scores,
            created_at: session.created_at,
            started_at: session.started_at,
            ended_at: session.ended_at,
        })
    }

    /// Adds a player to a session.
    ///
    /// Seated joins take the player's own vacated seat when one exists
    /// (rejoin), otherwise the lowest free seat. Taking over a vacated seat
    /// inherits its snapshotted running counter and consumes the record.
    #[instrument(skip(self))]
    pub async fn join_session(
        &self,
        session_id: &str,
        player_id: String,
        player_name: String,
        spectator: bool,
    ) -> Result<OccupantModel, AppError> {
        let session = self.require_session(session_id).await?;
        if session.is_completed() {
            return Err(AppError::Validation(
                "Cannot join a completed session".to_string(),
            ));
        }
        if self
            .repository
            .get_occupant(session_id, &player_id)
            .await?
            .is_some()
        {
            return Err(AppError::Validation(
                "Player is already in the session".to_string(),
            ));
        }

        let occupant = if spectator {
            OccupantModel {
                session_id: session_id.to_string(),
                player_id,
                player_name,
                seat: None,
                running_points: 0,
                is_spectator: true,
            }
        } else {
            let seat = self.assign_seat(session_id, &player_id).await?;
            let inherited = self.repository.remove_vacated_seat(session_id, seat).await?;
            let running_points = inherited
                .as_ref()
                .map(|record| record.running_points)
                .unwrap_or(0);
            if let Some(record) = &inherited {
                info!(
                    session_id = %session_id,
                    seat,
                    inherited_points = record.running_points,
                    previous_player = %record.player_id,
                    "New occupant inherits vacated counter"
                );
            }

            OccupantModel {
                session_id: session_id.to_string(),
                player_id,
                player_name,
                seat: Some(seat),
                running_points,
                is_spectator: false,
            }
        };

        self.repository.insert_occupant(&occupant).await?;
        info!(
            session_id = %session_id,
            player_id = %occupant.player_id,
            seat = ?occupant.seat,
            "Player joined session"
        );

        self.event_bus
            .emit_to_session(
                session_id,
                SessionEvent::OccupantsChanged {
                    session_id: session_id.to_string(),
                },
            )
            .await;

        Ok(occupant)
    }

    /// Removes a player from a session.
    ///
    /// A seated occupant leaving an active session leaves a vacated-seat
    /// record behind so a later occupant of the seat inherits the counter.
    #[instrument(skip(self))]
    pub async fn leave_session(&self, session_id: &str, player_id: &str) -> Result<(), AppError> {
        let session = self.require_session(session_id).await?;
        let occupant = self
            .repository
            .get_occupant(session_id, player_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Player is not in the session".to_string()))?;

        if session.status == SessionStatus::Active && !occupant.is_spectator {
            if let Some(seat) = occupant.seat {
                self.repository
                    .upsert_vacated_seat(&VacatedSeatModel {
                        session_id: session_id.to_string(),
                        seat,
                        player_id: occupant.player_id.clone(),
                        player_name: occupant.player_name.clone(),
                        running_points: occupant.running_points,
                    })
                    .await?;
                info!(
                    session_id = %session_id,
                    seat,
                    running_points = occupant.running_points,
                    "Snapshotted vacated seat"
                );
            }
        }

        self.repository.remove_occupant(session_id, player_id).await?;
        info!(session_id = %session_id, player_id = %player_id, "Player left session");

        self.event_bus
            .emit_to_session(
                session_id,
                SessionEvent::OccupantsChanged {
                    session_id: session_id.to_string(),
                },
            )
            .await;

        Ok(())
    }

    /// Moves a waiting session to active. All four seats must be occupied.
    #[instrument(skip(self))]
    pub async fn start_session(&self, session_id: &str) -> Result<SessionResponse, AppError> {
        let mut session = self.require_session(session_id).await?;
        if session.status != SessionStatus::Waiting {
            return Err(AppError::Conflict(format!(
                "Session is {} and cannot be started",
                session.status
            )));
        }

        let occupants = self.repository.get_occupants(session_id).await?;
        let seated = occupants
            .iter()
            .filter(|o| !o.is_spectator && o.seat.is_some())
            .count();
        if seated != SEATS.len() {
            return Err(AppError::Validation(format!(
                "All four seats must be occupied to start, got {seated}"
            )));
        }

        session.status = SessionStatus::Active;
        session.started_at = Some(Utc::now());
        self.repository.update_session(&session).await?;
        info!(session_id = %session_id, "Session started");

        self.emit_lifecycle(session_id, SessionStatus::Active).await;
        self.session_details(session_id).await
    }

    /// Completes an active session exactly once, freezing the replay-derived
    /// standings into the final snapshot.
    #[instrument(skip(self))]
    pub async fn finalize_session(&self, session_id: &str) -> Result<SessionResponse, AppError> {
        let mut session = self.require_session(session_id).await?;
        match session.status {
            SessionStatus::Active => {}
            SessionStatus::Completed => {
                return Err(AppError::Conflict(
                    "Session is already completed".to_string(),
                ));
            }
            SessionStatus::Waiting => {
                return Err(AppError::Validation(
                    "Session has not been started".to_string(),
                ));
            }
        }

        let occupants = self.repository.get_occupants(session_id).await?;
        let vacated = self.repository.get_vacated_seats(session_id).await?;
        let rounds = self.round_repository.list_rounds(session_id).await?;

        let seat_map = resolve_seat_map(None, &vacated, &occupants, &rounds);
        let totals = compute_seat_totals(&rounds, &seat_map);

        let mut final_scores = FinalScores::new();
        for &seat in &SEATS {
            let identity = occupants
                .iter()
                .filter(|o| !o.is_spectator)
                .find(|o| o.seat == Some(seat))
                .map(|o| (o.player_id.clone(), o.player_name.clone()))
                .or_else(|| {
                    vacated
                        .iter()
                        .find(|v| v.seat == seat)
                        .map(|v| (v.player_id.clone(), v.player_name.clone()))
                });
            if let Some((player_id, player_name)) = identity {
                final_scores.insert(
                    seat,
                    FinalSeatScore {
                        player_id,
                        player_name,
                        points: totals.get(&seat).copied().unwrap_or(0),
                    },
                );
            }
        }

        session.status = SessionStatus::Completed;
        session.final_scores = Some(final_scores);
        session.ended_at = Some(Utc::now());
        self.repository.update_session(&session).await?;
        info!(session_id = %session_id, "Session finalized");

        self.emit_lifecycle(session_id, SessionStatus::Completed)
            .await;
        self.session_details(session_id).await
    }

    /// Administrative deletion: removes the session and everything scoped to
    /// it, including the round ledger.
    #[instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        self.require_session(session_id).await?;
        let removed = self.round_repository.delete_session_rounds(session_id).await?;
        self.repository.delete_session(session_id).await?;
        info!(session_id = %session_id, rounds_removed = removed, "Session deleted");
        Ok(())
    }

    async fn require_session(&self, session_id: &str) -> Result<SessionModel, AppError> {
        self.repository
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    async fn assign_seat(&self, session_id: &str, player_id: &str) -> Result<Seat, AppError> {
        let occupants = self.repository.get_occupants(session_id).await?;
        let taken: HashSet<Seat> = occupants
            .iter()
            .filter(|o| !o.is_spectator)
            .filter_map(|o| o.seat)
            .collect();

        // A returning player retakes the seat they vacated when it is still
        // free; otherwise the lowest free seat wins.
        let vacated = self.repository.get_vacated_seats(session_id).await?;
        let rejoin_seat = vacated
            .iter()
            .find(|v| v.player_id == player_id && !taken.contains(&v.seat))
            .map(|v| v.seat);

        match rejoin_seat {
            Some(seat) => Ok(seat),
            None => SEATS
                .iter()
                .copied()
                .find(|seat| !taken.contains(seat))
                .ok_or_else(|| AppError::Validation("Session is full".to_string())),
        }
    }

    async fn emit_lifecycle(&self, session_id: &str, status: SessionStatus) {
        self.event_bus
            .emit_to_session(
                session_id,
                SessionEvent::LifecycleChanged {
                    session_id: session_id.to_string(),
                    status,
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::repository::InMemoryRoundRepository;
    use crate::session::repository::InMemorySessionRepository;

    fn service() -> SessionService {
        SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(InMemoryRoundRepository::new()),
            EventBus::new(),
        )
    }

    async fn full_session(service: &SessionService) -> String {
        let session = service
            .create_session("p1".to_string(), "Alice".to_string())
            .await
            .unwrap();
        for (id, name) in [("p2", "Bob"), ("p3", "Carol"), ("p4", "Dave")] {
            service
                .join_session(&session.id, id.to_string(), name.to_string(), false)
                .await
                .unwrap();
        }
        session.id
    }

    #[tokio::test]
    async fn create_seats_the_host_in_seat_one() {
        let service = service();
        let session = service
            .create_session("host".to_string(), "Host".to_string())
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.occupants.len(), 1);
        assert_eq!(session.occupants[0].seat, Some(1));
        assert_eq!(session.occupants[0].running_points, 0);
    }

    #[tokio::test]
    async fn seats_fill_lowest_first_and_cap_at_four() {
        let service = service();
        let session_id = full_session(&service).await;

        let details = service.session_details(&session_id).await.unwrap();
        let mut seats: Vec<_> = details.occupants.iter().filter_map(|o| o.seat).collect();
        seats.sort_unstable();
        assert_eq!(seats, vec![1, 2, 3, 4]);

        let result = service
            .join_session(&session_id, "p5".to_string(), "Eve".to_string(), false)
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn spectators_do_not_take_seats() {
        let service = service();
        let session = service
            .create_session("host".to_string(), "Host".to_string())
            .await
            .unwrap();

        let spectator = service
            .join_session(&session.id, "watcher".to_string(), "Watcher".to_string(), true)
            .await
            .unwrap();
        assert!(spectator.seat.is_none());
        assert!(spectator.is_spectator);

        // Four more seated players still fit
        for (id, name) in [("p2", "B"), ("p3", "C"), ("p4", "D")] {
            service
                .join_session(&session.id, id.to_string(), name.to_string(), false)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let service = service();
        let session = service
            .create_session("host".to_string(), "Host".to_string())
            .await
            .unwrap();

        let result = service
            .join_session(&session.id, "host".to_string(), "Host".to_string(), false)
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn start_requires_four_seated_players() {
        let service = service();
        let session = service
            .create_session("host".to_string(), "Host".to_string())
            .await
            .unwrap();

        let result = service.start_session(&session.id).await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));

        for (id, name) in [("p2", "B"), ("p3", "C"), ("p4", "D")] {
            service
                .join_session(&session.id, id.to_string(), name.to_string(), false)
                .await
                .unwrap();
        }
        let started = service.start_session(&session.id).await.unwrap();
        assert_eq!(started.status, SessionStatus::Active);
        assert!(started.started_at.is_some());
    }

    #[tokio::test]
    async fn starting_twice_conflicts() {
        let service = service();
        let session_id = full_session(&service).await;
        service.start_session(&session_id).await.unwrap();

        let result = service.start_session(&session_id).await;
        assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn leaving_active_session_writes_vacated_record_and_rejoin_inherits() {
        let service = service();
        let session_id = full_session(&service).await;
        service.start_session(&session_id).await.unwrap();

        service.leave_session(&session_id, "p3").await.unwrap();

        // New player takes the vacated seat 3 and inherits its counter
        let occupant = service
            .join_session(&session_id, "p5".to_string(), "Eve".to_string(), false)
            .await
            .unwrap();
        assert_eq!(occupant.seat, Some(3));
        assert_eq!(occupant.running_points, 0);
    }

    #[tokio::test]
    async fn returning_player_retakes_their_vacated_seat() {
        let service = service();
        let session_id = full_session(&service).await;
        service.start_session(&session_id).await.unwrap();

        service.leave_session(&session_id, "p2").await.unwrap();
        service.leave_session(&session_id, "p3").await.unwrap();

        // p3 vacated seat 3; even though seat 2 is the lowest free seat,
        // the rejoin goes back to seat 3.
        let occupant = service
            .join_session(&session_id, "p3".to_string(), "Carol".to_string(), false)
            .await
            .unwrap();
        assert_eq!(occupant.seat, Some(3));
    }

    #[tokio::test]
    async fn leaving_waiting_session_leaves_no_vacancy() {
        let service = service();
        let session_id = full_session(&service).await;

        service.leave_session(&session_id, "p2").await.unwrap();

        let occupant = service
            .join_session(&session_id, "p5".to_string(), "Eve".to_string(), false)
            .await
            .unwrap();
        assert_eq!(occupant.seat, Some(2));
        assert_eq!(occupant.running_points, 0);
    }

    #[tokio::test]
    async fn finalize_writes_snapshot_exactly_once() {
        let service = service();
        let session_id = full_session(&service).await;
        service.start_session(&session_id).await.unwrap();

        let finalized = service.finalize_session(&session_id).await.unwrap();
        assert_eq!(finalized.status, SessionStatus::Completed);
        let snapshot = finalized.final_scores.unwrap();
        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.values().all(|entry| entry.points == 0));

        let again = service.finalize_session(&session_id).await;
        assert!(matches!(again.unwrap_err(), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn join_after_completion_is_rejected() {
        let service = service();
        let session_id = full_session(&service).await;
        service.start_session(&session_id).await.unwrap();
        service.finalize_session(&session_id).await.unwrap();

        let result = service
            .join_session(&session_id, "p9".to_string(), "Nine".to_string(), false)
            .await;
        assert!(matches!(result.unwrap_err(), AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_session_removes_everything() {
        let service = service();
        let session_id = full_session(&service).await;

        service.delete_session(&session_id).await.unwrap();
        let result = service.session_details(&session_id).await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }
}
