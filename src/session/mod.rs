pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;
pub mod types;

pub use handlers::{
    create_session, delete_session, finalize_session, get_session, join_session, leave_session,
    start_session,
};
pub use models::{SessionModel, SessionStatus};
pub use repository::{InMemorySessionRepository, PostgresSessionRepository, SessionRepository};
pub use service::SessionService;
