pub mod models;
pub mod parser;
pub mod resolver;
pub mod grouping;
pub mod budget;
pub mod orchestrator;
pub mod stats;
pub mod manager;

pub use models::{FulfillmentOutcome, FulfillmentResult, ParticipantAmount, RawOrderLine, RestaurantBatch};
pub use parser::parse_order_text;
pub use resolver::ItemResolver;
pub use grouping::group_by_restaurant;
pub use orchestrator::{FulfillmentOrchestrator, OrchestratorConfig, RunOptions};
pub use stats::{StatsAggregator, StatsSummary, TopDish};
pub use manager::{CommandReply, OrderDesk, OrderingPolicy, ResolutionError};
