use async_trait::async_trait;

use crate::identity::ParticipantProfile;
use crate::orders::ParticipantOrder;
use crate::stats::StatsRecord;

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Today's pending orders, one per participant
#[async_trait]
pub trait PendingOrderStore: Send + Sync {
    /// All pending orders in the order participants first placed them
    async fn list(&self) -> StoreResult<Vec<ParticipantOrder>>;

    async fn get(&self, participant_id: &str) -> StoreResult<Option<ParticipantOrder>>;

    /// Insert or replace the participant's order (last write wins).
    /// Replacing clears any point-of-contact flag.
    async fn upsert(&self, order: ParticipantOrder) -> StoreResult<()>;

    async fn remove(&self, participant_id: &str) -> StoreResult<Option<ParticipantOrder>>;

    /// Remove the participant's order only while it is still `expected`.
    /// Returns whether anything was removed.
    async fn remove_if_unchanged(&self, expected: &ParticipantOrder) -> StoreResult<bool>;

    async fn clear_all(&self) -> StoreResult<()>;

    /// Flag the participant as point of contact, only while their stored
    /// order is still `expected`. Returns whether the flag was set.
    async fn mark_point_of_contact(&self, expected: &ParticipantOrder) -> StoreResult<bool>;
}

/// Long-lived spend/dish/contact statistics
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn record_spend(&self, participant_id: &str, restaurant: &str, cents: i32) -> StoreResult<()>;

    async fn record_dish(&self, participant_id: &str, restaurant: &str, item_name: &str) -> StoreResult<()>;

    async fn record_contact(&self, participant_id: &str) -> StoreResult<()>;

    async fn read_all(&self) -> StoreResult<StatsRecord>;
}

/// Registered participant contact details
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn get(&self, participant_id: &str) -> StoreResult<Option<ParticipantProfile>>;

    async fn upsert(&self, profile: ParticipantProfile) -> StoreResult<()>;
}
