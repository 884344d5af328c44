use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::event::EventBus;
use crate::round::repository::RoundRepository;
use crate::round::service::RoundService;
use crate::session::repository::SessionRepository;
use crate::session::service::SessionService;
use crate::stats::repository::StatsRepository;
use crate::stats::StatsService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub round_service: Arc<RoundService>,
    pub stats_service: Arc<StatsService>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        round_repository: Arc<dyn RoundRepository>,
        stats_repository: Arc<dyn StatsRepository>,
    ) -> Self {
        let event_bus = EventBus::new();
        let stats_service = Arc::new(StatsService::new(stats_repository));
        let session_service = Arc::new(SessionService::new(
            Arc::clone(&session_repository),
            Arc::clone(&round_repository),
            event_bus.clone(),
        ));
        let round_service = Arc::new(RoundService::new(
            session_repository,
            round_repository,
            Arc::clone(&stats_service),
            event_bus.clone(),
        ));

        Self {
            session_service,
            round_service,
            stats_service,
            event_bus,
        }
    }
}

/// Application error taxonomy.
///
/// `Validation` covers malformed or contradictory round input, `NotFound` a
/// missing session/round/occupant, `Conflict` a detected divergence between
/// expected and actual persisted state, and `Database` a storage failure.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
