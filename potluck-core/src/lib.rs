pub mod orders;
pub mod identity;
pub mod stats;
pub mod repository;
pub mod automation;
pub mod fulfillment;
pub mod events;
pub mod command;

pub use orders::{ItemOutcome, OptionStatus, ParticipantOrder, ResolvedOption, ResolvedOrderItem};
pub use identity::ParticipantProfile;
pub use stats::{DishCount, ParticipantStats, RestaurantStats, StatsRecord};
pub use repository::{ParticipantDirectory, PendingOrderStore, StatsStore, StoreResult};
pub use automation::{Allocation, CheckoutAutomation, CheckoutTotals, ContactDetails, Payer};
pub use fulfillment::{FailureKind, FulfillmentError, PipelineStep};
pub use events::EventPublisher;
pub use command::Command;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}
