use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, instrument, warn};

use super::models::{NewRound, RoundModel, WinKind};
use super::repository::RoundRepository;
use super::types::{RecordRoundRequest, RoundResponse, SeatStanding, SeatTotalsResponse};
use crate::event::{EventBus, SessionEvent};
use crate::scoring::{
    compute_round_delta, compute_seat_totals, points_for_fan, resolve_seat_map, SeatDelta, MAX_FAN,
    SEATS,
};
use crate::session::models::{OccupantModel, SessionStatus, VacatedSeatModel};
use crate::session::repository::SessionRepository;
use crate::shared::AppError;
use crate::stats::StatsService;

/// Round recorder and reverser.
///
/// These are the only operations that mutate shared session scoring state.
/// Each session has its own async mutex held for the whole
/// insert-apply-aggregate sequence, so two clients recording against the same
/// session serialize instead of overwriting each other's counter updates.
/// Reads (seat totals, history) replay the ledger lock-free.
pub struct RoundService {
    session_repository: Arc<dyn SessionRepository>,
    round_repository: Arc<dyn RoundRepository>,
    stats_service: Arc<StatsService>,
    event_bus: EventBus,
    session_mutexes: Arc<RwLock<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RoundService {
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        round_repository: Arc<dyn RoundRepository>,
        stats_service: Arc<StatsService>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            session_repository,
            round_repository,
            stats_service,
            event_bus,
            session_mutexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records a direct hit: points flow from the loser to the winner.
    pub async fn record_direct_hit(
        &self,
        session_id: &str,
        winner_id: String,
        loser_id: String,
        fan_count: u8,
        patterns: Vec<String>,
    ) -> Result<RoundResponse, AppError> {
        self.record(
            session_id,
            winner_id,
            Some(loser_id),
            WinKind::DirectHit,
            fan_count,
            patterns,
        )
        .await
    }

    /// Records a plain self-draw: cost split evenly across the other seats.
    pub async fn record_self_draw(
        &self,
        session_id: &str,
        winner_id: String,
        fan_count: u8,
        patterns: Vec<String>,
    ) -> Result<RoundResponse, AppError> {
        self.record(session_id, winner_id, None, WinKind::SelfDraw, fan_count, patterns)
            .await
    }

    /// Records a self-draw where one responsible player bears the whole cost.
    pub async fn record_self_draw_with_responsibility(
        &self,
        session_id: &str,
        winner_id: String,
        responsible_id: String,
        fan_count: u8,
        patterns: Vec<String>,
    ) -> Result<RoundResponse, AppError> {
        self.record(
            session_id,
            winner_id,
            Some(responsible_id),
            WinKind::SelfDrawResponsibility,
            fan_count,
            patterns,
        )
        .await
    }

    /// Records a scoring event from an API request.
    pub async fn record_round(
        &self,
        session_id: &str,
        request: RecordRoundRequest,
    ) -> Result<RoundResponse, AppError> {
        self.record(
            session_id,
            request.winner_id,
            request.loser_id,
            request.win_kind,
            request.fan_count,
            request.patterns,
        )
        .await
    }

    #[instrument(skip(self, patterns), fields(win_kind = %win_kind))]
    async fn record(
        &self,
        session_id: &str,
        winner_id: String,
        loser_id: Option<String>,
        win_kind: WinKind,
        fan_count: u8,
        patterns: Vec<String>,
    ) -> Result<RoundResponse, AppError> {
        let session = self.require_session(session_id).await?;
        if session.status != SessionStatus::Active {
            return Err(AppError::Validation(
                "Rounds can only be recorded in an active session".to_string(),
            ));
        }
        if fan_count > MAX_FAN {
            return Err(AppError::Validation(format!(
                "Fan count {fan_count} is out of range (0-{MAX_FAN})"
            )));
        }

        let session_lock = self.session_lock(session_id).await;
        let _guard = session_lock.lock().await;

        let occupants = self.session_repository.get_occupants(session_id).await?;
        validate_participants(&occupants, &winner_id, loser_id.as_deref(), win_kind)?;

        let base_points = points_for_fan(fan_count);
        let round = self
            .round_repository
            .insert_round(&NewRound {
                session_id: session_id.to_string(),
                winner_id,
                loser_id,
                win_kind,
                fan_count,
                base_points,
                patterns,
            })
            .await?;

        // The round is in the ledger from here on. If counter or stats
        // application fails below, the ledger stays authoritative and the
        // failure is surfaced as a reconciliation discrepancy.
        if let Err(error) = self.apply_round_effects(session_id, &occupants, &round).await {
            warn!(
                session_id = %session_id,
                round_id = round.id,
                error = %error,
                "Round partially applied; counters repair on next reconcile"
            );
            return Err(error);
        }

        info!(
            session_id = %session_id,
            round_id = round.id,
            win_kind = %round.win_kind,
            fan_count = round.fan_count,
            base_points = round.base_points,
            "Round recorded"
        );

        self.event_bus
            .emit_to_session(
                session_id,
                SessionEvent::RoundRecorded {
                    session_id: session_id.to_string(),
                    round_id: round.id,
                },
            )
            .await;

        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let seat_map = resolve_seat_map(None, &vacated, &occupants, &[]);
        Ok(RoundResponse::from_model(round, &seat_map))
    }

    async fn apply_round_effects(
        &self,
        session_id: &str,
        occupants: &[OccupantModel],
        round: &RoundModel,
    ) -> Result<(), AppError> {
        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let seat_map = resolve_seat_map(None, &vacated, occupants, &[]);
        let delta = compute_round_delta(round, &seat_map);

        self.apply_delta(session_id, occupants, &vacated, &delta)
            .await?;
        self.stats_service.apply_round(occupants, round).await?;
        self.reconcile_counters(session_id).await
    }

    /// Deletes a scoring event and applies the exact inverse deltas.
    ///
    /// Reversing the same round twice fails with `NotFound` on the second
    /// attempt; deltas are never double-applied. Lifetime stats stay as they
    /// were: deletion corrects the score, not the history books.
    #[instrument(skip(self))]
    pub async fn reverse_round(&self, session_id: &str, round_id: i64) -> Result<(), AppError> {
        let session = self.require_session(session_id).await?;

        let session_lock = self.session_lock(session_id).await;
        let _guard = session_lock.lock().await;

        let round = self
            .round_repository
            .get_round(round_id)
            .await?
            .filter(|round| round.session_id == session_id)
            .ok_or_else(|| AppError::NotFound("Round not found".to_string()))?;

        let occupants = self.session_repository.get_occupants(session_id).await?;
        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let rounds = self.round_repository.list_rounds(session_id).await?;

        // The full ledger backs the seat map here: the round's participants
        // may have left without vacated records long ago.
        let seat_map = resolve_seat_map(
            session.final_scores.as_ref(),
            &vacated,
            &occupants,
            &rounds,
        );
        let delta = compute_round_delta(&round, &seat_map);
        let negated: SeatDelta = delta.iter().map(|(&seat, &points)| (seat, -points)).collect();

        self.apply_delta(session_id, &occupants, &vacated, &negated)
            .await?;

        if !self.round_repository.delete_round(round_id).await? {
            warn!(
                session_id = %session_id,
                round_id,
                "Round vanished between inverse application and deletion"
            );
            return Err(AppError::Conflict(
                "Round was concurrently deleted".to_string(),
            ));
        }

        self.reconcile_counters(session_id).await?;

        info!(session_id = %session_id, round_id, "Round reversed");
        self.event_bus
            .emit_to_session(
                session_id,
                SessionEvent::RoundReversed {
                    session_id: session_id.to_string(),
                    round_id,
                },
            )
            .await;

        Ok(())
    }

    /// Replay-derived per-seat totals: the single source of truth for
    /// "current score" and final standings.
    #[instrument(skip(self))]
    pub async fn seat_totals(&self, session_id: &str) -> Result<SeatTotalsResponse, AppError> {
        let session = self.require_session(session_id).await?;
        let occupants = self.session_repository.get_occupants(session_id).await?;
        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let rounds = self.round_repository.list_rounds(session_id).await?;

        let seat_map = resolve_seat_map(
            session.final_scores.as_ref(),
            &vacated,
            &occupants,
            &rounds,
        );
        let totals = compute_seat_totals(&rounds, &seat_map);

        let standings = SEATS
            .iter()
            .map(|&seat| {
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
                    })
                    .or_else(|| {
                        session.final_scores.as_ref().and_then(|snapshot| {
                            snapshot
                                .get(&seat)
                                .map(|entry| (entry.player_id.clone(), entry.player_name.clone()))
                        })
                    });
                let (player_id, player_name) = identity.unzip();
                SeatStanding {
                    seat,
                    player_id,
                    player_name,
                    points: totals.get(&seat).copied().unwrap_or(0),
                }
            })
            .collect();

        Ok(SeatTotalsResponse {
            session_id: session_id.to_string(),
            totals,
            standings,
        })
    }

    /// Ledger history in creation order, each round with its seat deltas.
    #[instrument(skip(self))]
    pub async fn round_history(&self, session_id: &str) -> Result<Vec<RoundResponse>, AppError> {
        let session = self.require_session(session_id).await?;
        let occupants = self.session_repository.get_occupants(session_id).await?;
        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let rounds = self.round_repository.list_rounds(session_id).await?;

        let seat_map = resolve_seat_map(
            session.final_scores.as_ref(),
            &vacated,
            &occupants,
            &rounds,
        );

        Ok(rounds
            .into_iter()
            .map(|round| RoundResponse::from_model(round, &seat_map))
            .collect())
    }

    /// Compares every persisted running counter with the replay total for its
    /// seat and rewrites divergent counters from the replay.
    ///
    /// The replay is canonical; counters are a cache. Divergence is logged as
    /// a reconciliation discrepancy before being repaired.
    #[instrument(skip(self))]
    pub async fn reconcile_counters(&self, session_id: &str) -> Result<(), AppError> {
        let occupants = self.session_repository.get_occupants(session_id).await?;
        let vacated = self.session_repository.get_vacated_seats(session_id).await?;
        let rounds = self.round_repository.list_rounds(session_id).await?;

        let seat_map = resolve_seat_map(None, &vacated, &occupants, &rounds);
        let totals = compute_seat_totals(&rounds, &seat_map);

        for occupant in occupants.iter().filter(|o| !o.is_spectator) {
            let Some(seat) = occupant.seat else { continue };
            let expected = totals.get(&seat).copied().unwrap_or(0);
            if occupant.running_points != expected {
                warn!(
                    session_id = %session_id,
                    player_id = %occupant.player_id,
                    seat,
                    counter = occupant.running_points,
                    replay = expected,
                    "Running counter diverged from replay total, repairing"
                );
                self.session_repository
                    .set_running_points(session_id, &occupant.player_id, expected)
                    .await?;
            }
        }

        for record in &vacated {
            // A vacated record only survives while its seat is empty.
            if occupants.iter().any(|o| o.seat == Some(record.seat)) {
                continue;
            }
            let expected = totals.get(&record.seat).copied().unwrap_or(0);
            if record.running_points != expected {
                warn!(
                    session_id = %session_id,
                    seat = record.seat,
                    counter = record.running_points,
                    replay = expected,
                    "Vacated counter diverged from replay total, repairing"
                );
                self.session_repository
                    .set_vacated_points(session_id, record.seat, expected)
                    .await?;
            }
        }

        Ok(())
    }

    /// Applies a seat delta to the persisted counters: the seat's current
    /// occupant first, its vacated record as fallback. A seat with neither
    /// has no counter; the replay still accounts for it.
    async fn apply_delta(
        &self,
        session_id: &str,
        occupants: &[OccupantModel],
        vacated: &[VacatedSeatModel],
        delta: &SeatDelta,
    ) -> Result<(), AppError> {
        for (&seat, &points) in delta {
            if points == 0 {
                continue;
            }
            if let Some(occupant) = occupants
                .iter()
                .filter(|o| !o.is_spectator)
                .find(|o| o.seat == Some(seat))
            {
                self.session_repository
                    .apply_points_delta(session_id, &occupant.player_id, points)
                    .await?;
            } else if vacated.iter().any(|v| v.seat == seat) {
                self.session_repository
                    .apply_vacated_points_delta(session_id, seat, points)
                    .await?;
            }
        }
        Ok(())
    }

    async fn require_session(
        &self,
        session_id: &str,
    ) -> Result<crate::session::models::SessionModel, AppError> {
        self.session_repository
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }

    async fn session_lock(&self, session_id: &str) -> Arc<AsyncMutex<()>> {
        {
            let guard = self.session_mutexes.read().await;
            if let Some(lock) = guard.get(session_id) {
                return lock.clone();
            }
        }

        let mut guard = self.session_mutexes.write().await;
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

fn validate_participants(
    occupants: &[OccupantModel],
    winner_id: &str,
    loser_id: Option<&str>,
    win_kind: WinKind,
) -> Result<(), AppError> {
    let is_seated = |player_id: &str| {
        occupants
            .iter()
            .any(|o| !o.is_spectator && o.seat.is_some() && o.player_id == player_id)
    };

    if !is_seated(winner_id) {
        return Err(AppError::Validation(
            "Winner is not a seated occupant of the session".to_string(),
        ));
    }

    match (win_kind.requires_loser(), loser_id) {
        (true, None) => Err(AppError::Validation(format!(
            "Win kind {win_kind} requires a loser"
        ))),
        (true, Some(loser_id)) => {
            if loser_id == winner_id {
                return Err(AppError::Validation(
                    "Winner and loser must be distinct".to_string(),
                ));
            }
            if !is_seated(loser_id) {
                return Err(AppError::Validation(
                    "Loser is not a seated occupant of the session".to_string(),
                ));
            }
            Ok(())
        }
        (false, Some(_)) => Err(AppError::Validation(
            "A plain self-draw cannot name a loser".to_string(),
        )),
        (false, None) => Ok(()),
    }
}
