//! Typed event bus for repository-level notifications.
//!
//! Live queries already carry data changes to views. The bus carries the
//! business meaning of a change (an incident was taken, an alert went out)
//! to anyone who wants to react to it, without coupling repositories to
//! their listeners.

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Business events emitted by repositories after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A user logged in and became the session user.
    LoggedIn { user_id: i64 },
    /// The session was cleared.
    LoggedOut { user_id: i64 },
    /// A new account was created.
    UserRegistered { user_id: i64 },
    /// Profile fields or photo changed.
    ProfileUpdated { user_id: i64 },
    /// A new incident was reported.
    IncidentCreated { incident_id: i64 },
    /// An incident's editable content changed.
    IncidentUpdated { incident_id: i64 },
    /// An incident moved to ASSIGNED.
    IncidentAssigned { incident_id: i64, user_id: i64 },
    /// An incident moved to CLOSED.
    IncidentClosed { incident_id: i64 },
    /// An alert template was fanned out.
    AlertBroadcast { template_id: i64, recipients: usize },
    /// Every copy of an alert template was soft-deleted.
    AlertWithdrawn { template_id: i64, copies: usize },
    /// A chat message was stored.
    ChatMessageSent { conversation_id: i64, message_id: i64 },
    /// The simulated support reply was stored.
    SupportReplyDelivered { conversation_id: i64, message_id: i64 },
}

/// Application-wide event bus backed by a tokio broadcast channel.
///
/// Every subscriber gets every event. Slow subscribers that fall behind
/// receive a `Lagged` error and miss events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => debug!("event {label} delivered to {count} subscriber(s)"),
            Err(_) => debug!("event {label} has no subscribers"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Write every event to the log under the `brigada::events` target.
    ///
    /// The task ends once every clone of the bus is dropped and the
    /// backlog is written.
    pub fn spawn_logger(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => info!(target: "brigada::events", "{}: {event:?}", event_label(&event)),
                    Err(RecvError::Lagged(n)) => warn!(target: "brigada::events", "{n} event(s) not logged"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(br_core::constants::CHANGE_CHANNEL_CAPACITY)
    }
}

fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::LoggedIn { .. } => "LoggedIn",
        AppEvent::LoggedOut { .. } => "LoggedOut",
        AppEvent::UserRegistered { .. } => "UserRegistered",
        AppEvent::ProfileUpdated { .. } => "ProfileUpdated",
        AppEvent::IncidentCreated { .. } => "IncidentCreated",
        AppEvent::IncidentUpdated { .. } => "IncidentUpdated",
        AppEvent::IncidentAssigned { .. } => "IncidentAssigned",
        AppEvent::IncidentClosed { .. } => "IncidentClosed",
        AppEvent::AlertBroadcast { .. } => "AlertBroadcast",
        AppEvent::AlertWithdrawn { .. } => "AlertWithdrawn",
        AppEvent::ChatMessageSent { .. } => "ChatMessageSent",
        AppEvent::SupportReplyDelivered { .. } => "SupportReplyDelivered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(AppEvent::IncidentClosed { incident_id: 4 });
        assert_eq!(rx1.recv().await.unwrap(), AppEvent::IncidentClosed { incident_id: 4 });
        assert_eq!(rx2.recv().await.unwrap(), AppEvent::IncidentClosed { incident_id: 4 });
    }

    #[tokio::test]
    async fn test_logger_drains_and_stops_with_the_bus() {
        let bus = EventBus::new(16);
        let logger = bus.spawn_logger();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(AppEvent::LoggedIn { user_id: 1 });
        bus.emit(AppEvent::AlertBroadcast { template_id: 2, recipients: 4 });
        drop(bus);

        tokio::time::timeout(std::time::Duration::from_secs(1), logger)
            .await
            .expect("logger kept running after the bus closed")
            .unwrap();
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let bus = EventBus::new(4);
        bus.emit(AppEvent::LoggedOut { user_id: 1 });
    }
}
