use async_trait::async_trait;

use crate::repository::StoreResult;

pub const TOPIC_ORDER_PLACED: &str = "order.placed";
pub const TOPIC_FULFILLMENT_COMPLETED: &str = "fulfillment.completed";
pub const TOPIC_FULFILLMENT_FAILED: &str = "fulfillment.failed";

/// Outbound event sink (notifications, confirmations and audit hang off this)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> StoreResult<()>;
}
