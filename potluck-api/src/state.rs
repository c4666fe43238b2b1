use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use potluck_catalog::MenuCatalog;
use potluck_core::{CheckoutAutomation, EventPublisher, ParticipantDirectory, PendingOrderStore, StatsStore};
use potluck_order::{
    FulfillmentOrchestrator, FulfillmentResult, ItemResolver, OrchestratorConfig, OrderDesk, OrderingPolicy,
    StatsAggregator,
};
use potluck_store::Config;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Everything the handlers need, resolved from [`Config`]
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub policy: OrderingPolicy,
    pub orchestrator: OrchestratorConfig,
    pub suggestion_threshold: Option<usize>,
    /// Used when a run request does not say
    pub dry_run_default: bool,
    pub seed: Option<u64>,
}

impl Settings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ordering = &config.ordering;
        let fulfillment = &config.fulfillment;

        Ok(Self {
            policy: OrderingPolicy {
                cutoff: ordering.cutoff_time().context("invalid ordering.cutoff")?,
                per_person_cap_cents: ordering.per_person_cap_cents,
            },
            orchestrator: OrchestratorConfig {
                delivery_slot: ordering.delivery_slot_time().context("invalid ordering.delivery_slot")?,
                max_retries: fulfillment.max_retries,
                step_timeout: Duration::from_millis(fulfillment.step_timeout_ms),
                retry_delay: Duration::from_millis(fulfillment.retry_delay_ms),
                per_person_cap_cents: ordering.per_person_cap_cents,
                gratuity_tolerance_cents: ordering.gratuity_tolerance_cents,
                clear_on_success: fulfillment.clear_on_success,
            },
            suggestion_threshold: Some(ordering.suggestion_threshold),
            dry_run_default: fulfillment.dry_run,
            seed: fulfillment.seed,
        })
    }
}

/// Ports the service is wired to
pub struct Services {
    pub catalog: Arc<dyn MenuCatalog>,
    pub orders: Arc<dyn PendingOrderStore>,
    pub stats: Arc<dyn StatsStore>,
    pub directory: Arc<dyn ParticipantDirectory>,
    pub events: Arc<dyn EventPublisher>,
    pub automation: Arc<dyn CheckoutAutomation>,
}

/// Outcome of the most recent fulfillment run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub dry_run: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<FulfillmentResult>,
}

impl RunReport {
    pub fn new(started_at: chrono::DateTime<chrono::Utc>, dry_run: bool, results: Vec<FulfillmentResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            started_at,
            dry_run,
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<OrderDesk>,
    pub orchestrator: Arc<FulfillmentOrchestrator>,
    pub orders: Arc<dyn PendingOrderStore>,
    pub settings: Arc<Settings>,
    pub last_run: Arc<RwLock<Option<RunReport>>>,
    /// Cancelled on shutdown; in-flight runs stop at the next step boundary
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(services: Services, settings: Settings) -> Self {
        let stats = StatsAggregator::new(services.stats);
        let resolver = settings
            .suggestion_threshold
            .map(ItemResolver::new)
            .unwrap_or_default();

        let desk = OrderDesk::new(
            services.catalog.clone(),
            services.orders.clone(),
            services.directory.clone(),
            stats.clone(),
            resolver,
            settings.policy.clone(),
        )
        .with_events(services.events.clone());

        let mut orchestrator = FulfillmentOrchestrator::new(
            services.automation,
            services.catalog,
            services.orders.clone(),
            services.directory,
            stats,
            settings.orchestrator.clone(),
        )
        .with_events(services.events);
        if let Some(seed) = settings.seed {
            orchestrator = orchestrator.with_seed(seed);
        }

        Self {
            desk: Arc::new(desk),
            orchestrator: Arc::new(orchestrator),
            orders: services.orders,
            settings: Arc::new(settings),
            last_run: Arc::new(RwLock::new(None)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Fulfill everything pending and remember the report
    pub async fn run_fulfillment(&self, dry_run: bool) -> anyhow::Result<RunReport> {
        let started_at = chrono::Utc::now();
        let results = self
            .orchestrator
            .run_pending(potluck_order::RunOptions { dry_run }, self.shutdown.child_token())
            .await?;

        let report = RunReport::new(started_at, dry_run, results);
        *self.last_run.write().await = Some(report.clone());
        Ok(report)
    }
}
