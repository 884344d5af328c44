use serde::{Deserialize, Serialize};

use crate::session::models::SessionStatus;

/// Events emitted whenever session-scoped state changes.
///
/// Events represent facts about things that have already happened. Beyond the
/// session id the payload is a coarse hint; subscribers re-fetch and re-run
/// the reconciliation replay rather than patching their state from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Occupancy or vacated-seat records changed (join, leave, inherit).
    OccupantsChanged { session_id: String },

    /// The session moved through its lifecycle (created, started, finalized).
    LifecycleChanged {
        session_id: String,
        status: SessionStatus,
    },

    /// A scoring event was committed to the ledger.
    RoundRecorded { session_id: String, round_id: i64 },

    /// A scoring event was deleted and its deltas reversed.
    RoundReversed { session_id: String, round_id: i64 },
}

impl SessionEvent {
    /// Get the session id associated with this event.
    /// All events are session-specific.
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::OccupantsChanged { session_id } => session_id,
            SessionEvent::LifecycleChanged { session_id, .. } => session_id,
            SessionEvent::RoundRecorded { session_id, .. } => session_id,
            SessionEvent::RoundReversed { session_id, .. } => session_id,
        }
    }

    /// Get a human-readable description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::OccupantsChanged { .. } => "occupants_changed",
            SessionEvent::LifecycleChanged { .. } => "lifecycle_changed",
            SessionEvent::RoundRecorded { .. } => "round_recorded",
            SessionEvent::RoundReversed { .. } => "round_reversed",
        }
    }
}
