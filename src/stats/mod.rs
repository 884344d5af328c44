pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use handlers::get_player_stats;
pub use models::{PlayerStatsModel, LIMIT_HAND_FAN};
pub use repository::{InMemoryStatsRepository, PostgresStatsRepository, StatsRepository};
pub use service::StatsService;
