//! Repository port for result artifacts.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::InboxItem;

#[async_trait]
pub trait InboxRepository: Send + Sync {
    async fn create(&self, item: &InboxItem) -> DomainResult<()>;

    /// Newest first.
    async fn list_recent(&self, limit: usize) -> DomainResult<Vec<InboxItem>>;
}
