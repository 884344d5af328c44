// Library crate for the mahjong scoring ledger server
// This file exposes the public API for integration tests

pub mod event;
pub mod round;
pub mod scoring;
pub mod session;
pub mod shared;
pub mod stats;

// Re-export commonly used types for easier access in tests
pub use event::{EventBus, SessionEvent};
pub use round::{models::RoundModel, models::WinKind, repository::RoundRepository};
pub use scoring::{compute_round_delta, compute_seat_totals, points_for_fan, resolve_seat_map};
pub use session::{models::SessionModel, repository::SessionRepository};
pub use shared::AppError;
pub use stats::{repository::StatsRepository, StatsService};
