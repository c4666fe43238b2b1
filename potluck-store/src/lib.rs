pub mod app_config;
pub mod memory;
pub mod snapshot;
pub mod events;
pub mod checkout;

pub use app_config::Config;
pub use memory::{MemoryDirectory, MemoryOrderStore, MemoryStatsStore};
pub use snapshot::SnapshotFile;
pub use events::LogEventPublisher;
pub use checkout::SimulatedCheckout;
