//! Outbound sinks for result artifacts and agent status.

use crate::domain::models::{AgentStatus, InboxItem};

/// Pushes engine output to whoever is listening. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn publish_inbox(&self, item: &InboxItem);

    fn publish_status(&self, status: AgentStatus);
}
