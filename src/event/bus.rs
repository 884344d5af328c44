use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::SessionEvent;

const SESSION_CHANNEL_CAPACITY: usize = 100;

/// Event bus distributing change notifications per session.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Session-specific event channels: session_id -> sender
    session_channels: Arc<RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            session_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Emits an event to all subscribers of a specific session.
    pub async fn emit_to_session(&self, session_id: &str, event: SessionEvent) {
        let session_channels = self.session_channels.read().await;

        if let Some(sender) = session_channels.get(session_id) {
            match sender.send(event) {
                Ok(receiver_count) => {
                    debug!(
                        session_id = %session_id,
                        receivers = receiver_count,
                        "Session event emitted"
                    );
                }
                Err(_) => {
                    debug!(session_id = %session_id, "Session event emitted with no receivers");
                }
            }
        } else {
            debug!(session_id = %session_id, "No session channel found - creating one");
            drop(session_channels);

            let mut session_channels = self.session_channels.write().await;
            let (sender, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
            session_channels.insert(session_id.to_string(), sender.clone());

            if sender.send(event).is_err() {
                debug!(session_id = %session_id, "Session event sent to new channel with no receivers");
            }
        }
    }

    /// Subscribe to events for a specific session.
    pub async fn subscribe_to_session(&self, session_id: &str) -> broadcast::Receiver<SessionEvent> {
        let session_channels = self.session_channels.read().await;

        if let Some(sender) = session_channels.get(session_id) {
            sender.subscribe()
        } else {
            debug!(session_id = %session_id, "Creating new session channel for subscription");
            drop(session_channels);

            let mut session_channels = self.session_channels.write().await;
            let (sender, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
            let receiver = sender.subscribe();
            session_channels.insert(session_id.to_string(), sender);
            receiver
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
