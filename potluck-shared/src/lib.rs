pub mod models;
pub mod pii;

pub use models::events::{FulfillmentCompletedEvent, FulfillmentFailedEvent, OrderPlacedEvent};
pub use pii::Masked;
