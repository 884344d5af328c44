pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use handlers::{delete_round, get_round_history, get_seat_totals, record_round};
pub use models::{NewRound, RoundModel, WinKind};
pub use repository::{InMemoryRoundRepository, PostgresRoundRepository, RoundRepository};
pub use service::RoundService;
