//! Broadcast bus for engine output.
//!
//! Carries agent status transitions and published result artifacts to every
//! live receiver (CLI watchers, the `engine:run_finished` trigger).

use tokio::sync::broadcast;

use crate::domain::models::{AgentStatus, EngineEvent, InboxItem};
use crate::domain::ports::Notifier;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: EngineEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Notifier for EventBus {
    fn publish_inbox(&self, item: &InboxItem) {
        self.publish(EngineEvent::Inbox(item.clone()));
    }

    fn publish_status(&self, status: AgentStatus) {
        tracing::trace!(status = status.as_str(), "agent status");
        self.publish(EngineEvent::Status(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish_status(AgentStatus::Thinking);
        let item =
            InboxItem::task_result(Uuid::new_v4(), Uuid::new_v4(), "t".into(), "c".into(), false);
        bus.publish_inbox(&item);
        bus.publish_status(AgentStatus::Idle);

        assert!(matches!(rx.recv().await.unwrap(), EngineEvent::Status(AgentStatus::Thinking)));
        match rx.recv().await.unwrap() {
            EngineEvent::Inbox(got) => assert_eq!(got.id, item.id),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(rx.recv().await.unwrap(), EngineEvent::Status(AgentStatus::Idle)));
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish_status(AgentStatus::Idle);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
