use std::sync::Arc;

use mahjongpad::event::EventBus;
use mahjongpad::round::repository::InMemoryRoundRepository;
use mahjongpad::round::service::RoundService;
use mahjongpad::session::repository::InMemorySessionRepository;
use mahjongpad::session::service::SessionService;
use mahjongpad::stats::repository::InMemoryStatsRepository;
use mahjongpad::stats::StatsService;

/// Four seated players used by the workflow tests, in seat order.
pub const PLAYERS: [(&str, &str); 4] = [
    ("p1", "Alice"),
    ("p2", "Bob"),
    ("p3", "Carol"),
    ("p4", "Dave"),
];

/// In-memory service wiring shared by the workflow tests.
pub struct TestContext {
    pub session_service: Arc<SessionService>,
    pub round_service: Arc<RoundService>,
    pub stats_service: Arc<StatsService>,
    pub event_bus: EventBus,
}

impl TestContext {
    pub fn new() -> Self {
        let session_repository = Arc::new(InMemorySessionRepository::new());
        let round_repository = Arc::new(InMemoryRoundRepository::new());
        let stats_repository = Arc::new(InMemoryStatsRepository::new());
        let event_bus = EventBus::new();

        let stats_service = Arc::new(StatsService::new(stats_repository));
        let session_service = Arc::new(SessionService::new(
            session_repository.clone(),
            round_repository.clone(),
            event_bus.clone(),
        ));
        let round_service = Arc::new(RoundService::new(
            session_repository,
            round_repository,
            stats_service.clone(),
            event_bus.clone(),
        ));

        Self {
            session_service,
            round_service,
            stats_service,
            event_bus,
        }
    }

    /// Creates a session with four seated players and starts it.
    ///
    /// The host lands in seat 1 and the remaining players fill seats 2-4 in
    /// join order, so tests can rely on `p1..p4` mapping to seats `1..4`.
    pub async fn active_session(&self) -> String {
        let (host_id, host_name) = PLAYERS[0];
        let session = self
            .session_service
            .create_session(host_id.to_string(), host_name.to_string())
            .await
            .expect("create session");

        for (player_id, player_name) in &PLAYERS[1..] {
            self.session_service
                .join_session(
                    &session.id,
                    player_id.to_string(),
                    player_name.to_string(),
                    false,
                )
                .await
                .expect("join session");
        }

        self.session_service
            .start_session(&session.id)
            .await
            .expect("start session");
        session.id
    }

    /// Running counter of one seated player, read back from the session.
    pub async fn running_points(&self, session_id: &str, player_id: &str) -> i32 {
        let details = self
            .session_service
            .session_details(session_id)
            .await
            .expect("session details");
        details
            .occupants
            .iter()
            .find(|o| o.player_id == player_id)
            .map(|o| o.running_points)
            .expect("player is in the session")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
