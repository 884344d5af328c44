mod event;
mod round;
mod scoring;
mod session;
mod shared;
mod stats;

use axum::{
    routing::{delete, get, post},
    Router,
};
use round::repository::{InMemoryRoundRepository, PostgresRoundRepository, RoundRepository};
use session::repository::{
    InMemorySessionRepository, PostgresSessionRepository, SessionRepository,
};
use shared::AppState;
use stats::repository::{InMemoryStatsRepository, PostgresStatsRepository, StatsRepository};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mahjongpad=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting mahjong scoring server");

    let (session_repository, round_repository, stats_repository) = build_repositories().await;
    let app_state = AppState::new(session_repository, round_repository, stats_repository);

    let app = Router::new()
        .route("/sessions", post(session::create_session))
        .route("/sessions/:id", get(session::get_session))
        .route("/sessions/:id", delete(session::delete_session))
        .route("/sessions/:id/join", post(session::join_session))
        .route("/sessions/:id/leave", post(session::leave_session))
        .route("/sessions/:id/start", post(session::start_session))
        .route("/sessions/:id/finalize", post(session::finalize_session))
        .route("/sessions/:id/rounds", post(round::record_round))
        .route("/sessions/:id/rounds", get(round::get_round_history))
        .route("/sessions/:id/rounds/:round_id", delete(round::delete_round))
        .route("/sessions/:id/scores", get(round::get_seat_totals))
        .route("/players/:player_id/stats", get(stats::get_player_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");
    info!("Server running on http://{}", bind_addr);
    axum::serve(listener, app).await.expect("Server error");
}

/// Selects Postgres-backed repositories when DATABASE_URL is set, otherwise
/// falls back to the in-memory implementations.
async fn build_repositories() -> (
    Arc<dyn SessionRepository>,
    Arc<dyn RoundRepository>,
    Arc<dyn StatsRepository>,
) {
    match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::PgPool::connect(&database_url)
                .await
                .expect("Failed to connect to database");
            info!("Using Postgres repositories");
            (
                Arc::new(PostgresSessionRepository::new(pool.clone())),
                Arc::new(PostgresRoundRepository::new(pool.clone())),
                Arc::new(PostgresStatsRepository::new(pool)),
            )
        }
        Err(_) => {
            info!("DATABASE_URL not set, using in-memory repositories");
            (
                Arc::new(InMemorySessionRepository::new()),
                Arc::new(InMemoryRoundRepository::new()),
                Arc::new(InMemoryStatsRepository::new()),
            )
        }
    }
}
