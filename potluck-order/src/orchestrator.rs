use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::NaiveTime;
use futures_util::FutureExt;
use potluck_catalog::MenuCatalog;
use potluck_core::events::{TOPIC_FULFILLMENT_COMPLETED, TOPIC_FULFILLMENT_FAILED};
use potluck_core::{
    CheckoutAutomation, ContactDetails, EventPublisher, FulfillmentError, ParticipantDirectory, Payer,
    PendingOrderStore, PipelineStep,
};
use potluck_shared::{FulfillmentCompletedEvent, FulfillmentFailedEvent};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Mutex as SessionLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::budget::{check_budget, BudgetDecision, DEFAULT_GRATUITY_TOLERANCE_CENTS};
use crate::grouping::group_by_restaurant;
use crate::models::{BatchState, FulfillmentOutcome, FulfillmentResult, ParticipantAmount, RestaurantBatch};
use crate::stats::StatsAggregator;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub delivery_slot: NaiveTime,
    /// Extra attempts after the first, for retryable failures only
    pub max_retries: u32,
    pub step_timeout: Duration,
    pub retry_delay: Duration,
    pub per_person_cap_cents: i32,
    pub gratuity_tolerance_cents: i32,
    /// Remove a restaurant's pending orders once it is submitted
    pub clear_on_success: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            delivery_slot: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or_default(),
            max_retries: 2,
            step_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(5),
            per_person_cap_cents: 2500,
            gratuity_tolerance_cents: DEFAULT_GRATUITY_TOLERANCE_CENTS,
            clear_on_success: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run every step except the final submission and leave no trace
    pub dry_run: bool,
}

struct PipelineSuccess {
    contact: ContactDetails,
    confirmation_ref: String,
    amounts: Vec<ParticipantAmount>,
}

/// Progress of one restaurant through its attempts
struct BatchRun<'a> {
    restaurant: &'a str,
    state: BatchState,
    attempt: u32,
}

impl<'a> BatchRun<'a> {
    fn new(restaurant: &'a str) -> Self {
        Self {
            restaurant,
            state: BatchState::Idle,
            attempt: 0,
        }
    }

    fn start_attempt(&mut self) {
        self.attempt += 1;
        self.enter(PipelineStep::SelectTimeSlot);
    }

    fn enter(&mut self, step: PipelineStep) {
        self.state = BatchState::Running {
            step,
            attempt: self.attempt,
        };
        debug!(restaurant = self.restaurant, attempt = self.attempt, step = %step, "Entering step");
    }

    fn finish(&mut self, state: BatchState) {
        debug!(restaurant = self.restaurant, from = ?self.state, to = ?state, "Batch finished");
        self.state = state;
    }
}

/// Drives each restaurant's batch through the checkout pipeline.
///
/// Batches run strictly one after another over a single automation session.
/// A failure in one restaurant never affects the others.
pub struct FulfillmentOrchestrator {
    automation: Arc<dyn CheckoutAutomation>,
    catalog: Arc<dyn MenuCatalog>,
    orders: Arc<dyn PendingOrderStore>,
    directory: Arc<dyn ParticipantDirectory>,
    stats: StatsAggregator,
    events: Option<Arc<dyn EventPublisher>>,
    config: OrchestratorConfig,
    rng: Mutex<StdRng>,
    session: SessionLock<()>,
}

impl FulfillmentOrchestrator {
    pub fn new(
        automation: Arc<dyn CheckoutAutomation>,
        catalog: Arc<dyn MenuCatalog>,
        orders: Arc<dyn PendingOrderStore>,
        directory: Arc<dyn ParticipantDirectory>,
        stats: StatsAggregator,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            automation,
            catalog,
            orders,
            directory,
            stats,
            events: None,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
            session: SessionLock::new(()),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Make point-of-contact selection reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Fulfill everything currently pending
    pub async fn run_pending(
        &self,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<Vec<FulfillmentResult>, FulfillmentError> {
        let pending = self.orders.list().await.map_err(store_error)?;
        let batches = group_by_restaurant(pending);
        Ok(self.run(batches, options, cancel).await)
    }

    /// Fulfill each batch in turn. Every batch gets exactly one result; once
    /// `cancel` fires, the remaining batches are reported as cancelled.
    pub async fn run(
        &self,
        batches: Vec<RestaurantBatch>,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Vec<FulfillmentResult> {
        let _session = self.session.lock().await;
        info!(batches = batches.len(), dry_run = options.dry_run, "Starting fulfillment run");

        let mut results = Vec::with_capacity(batches.len());
        for batch in &batches {
            let result = if cancel.is_cancelled() {
                FulfillmentResult::failed(batch, &FulfillmentError::Cancelled, 0, options.dry_run)
            } else {
                self.fulfill(batch, options, &cancel)
                    .instrument(info_span!("fulfill", restaurant = %batch.restaurant))
                    .await
            };
            self.publish(batch, &result).await;
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        info!(succeeded, failed = results.len() - succeeded, "Fulfillment run finished");
        results
    }

    async fn fulfill(&self, batch: &RestaurantBatch, options: RunOptions, cancel: &CancellationToken) -> FulfillmentResult {
        info!("Beginning order from {}", batch.restaurant);
        let mut run = BatchRun::new(&batch.restaurant);

        if let Err(err) = self.check_delivery_minimum(batch).await {
            warn!(error = %err, "Skipping restaurant");
            run.finish(BatchState::Failed { retryable: false });
            return FulfillmentResult::failed(batch, &err, 0, options.dry_run);
        }

        let max_attempts = self.config.max_retries + 1;
        loop {
            run.start_attempt();
            match self.run_pipeline(batch, options, cancel, &mut run).await {
                Ok(success) => {
                    run.finish(BatchState::Succeeded);
                    info!(attempt = run.attempt, confirmation = %success.confirmation_ref, "Order placed");
                    if !options.dry_run {
                        self.record_success(batch, &success).await;
                    }
                    return FulfillmentResult {
                        restaurant: batch.restaurant.clone(),
                        attempts: run.attempt,
                        dry_run: options.dry_run,
                        outcome: FulfillmentOutcome::Success {
                            point_of_contact: success.contact.participant_id,
                            confirmation_ref: success.confirmation_ref,
                            participant_amounts: success.amounts,
                        },
                    };
                }
                Err(err) if err.is_retryable() && run.attempt < max_attempts => {
                    warn!(attempt = run.attempt, error = %err, "Retrying order from {}", batch.restaurant);
                    if self.wait_before_retry(cancel).await.is_err() {
                        run.finish(BatchState::Failed { retryable: false });
                        return FulfillmentResult::failed(batch, &FulfillmentError::Cancelled, run.attempt, options.dry_run);
                    }
                }
                Err(err) => {
                    error!(attempt = run.attempt, error = %err, "Order from {} failed", batch.restaurant);
                    run.finish(BatchState::Failed {
                        retryable: err.is_retryable(),
                    });
                    return FulfillmentResult::failed(batch, &err, run.attempt, options.dry_run);
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        batch: &RestaurantBatch,
        options: RunOptions,
        cancel: &CancellationToken,
        run: &mut BatchRun<'_>,
    ) -> Result<PipelineSuccess, FulfillmentError> {
        let automation = &self.automation;

        self.step(run, PipelineStep::SelectTimeSlot, cancel, automation.select_time_slot(self.config.delivery_slot))
            .await?;
        self.step(run, PipelineStep::SelectRestaurant, cancel, automation.select_restaurant(&batch.restaurant))
            .await?;

        let mut amounts = Vec::new();
        for member in batch.billable_members() {
            let items: Vec<_> = member.billable_items().cloned().collect();
            let amount_cents = self
                .step(run, PipelineStep::AddItems, cancel, automation.add_items(&member.participant_id, &items))
                .await?;
            amounts.push(ParticipantAmount {
                participant_id: member.participant_id.clone(),
                amount_cents,
            });
        }

        let payers = self.payers(batch).await?;
        let totals = self
            .step(run, PipelineStep::AllocatePayers, cancel, automation.allocate_payers(&payers))
            .await?;

        match check_budget(&totals, self.config.gratuity_tolerance_cents) {
            BudgetDecision::WithinBudget => {}
            BudgetDecision::ReduceGratuity { gratuity_cents } => {
                info!(from = totals.gratuity_cents, to = gratuity_cents, "Lowering gratuity to fit budget");
                self.step(run, PipelineStep::AdjustGratuity, cancel, automation.adjust_gratuity(gratuity_cents))
                    .await?;
            }
            BudgetDecision::Exceeded { excess_cents } => {
                let highest = amounts.iter().max_by_key(|a| a.amount_cents);
                return Err(FulfillmentError::BudgetExceeded {
                    excess_cents,
                    participant: highest.map(|a| a.participant_id.clone()).unwrap_or_default(),
                    highest_cents: highest.map(|a| a.amount_cents).unwrap_or_default(),
                });
            }
        }

        let contact = self.choose_point_of_contact(batch).await?;
        info!(participant = %contact.participant_id, "Selected point of contact");
        self.step(run, PipelineStep::SelectPointOfContact, cancel, automation.select_point_of_contact(&contact))
            .await?;

        if options.dry_run {
            info!("Dry run, not submitting order from {}", batch.restaurant);
        } else {
            self.step(run, PipelineStep::Submit, cancel, automation.submit()).await?;
        }

        let confirmation_ref = self
            .step(run, PipelineStep::GenerateConfirmation, cancel, automation.generate_confirmation(&batch.restaurant))
            .await?;

        Ok(PipelineSuccess {
            contact,
            confirmation_ref,
            amounts,
        })
    }

    /// Run one automation call under the step timeout, watching for
    /// cancellation and turning a panic into an error.
    async fn step<T, F>(
        &self,
        run: &mut BatchRun<'_>,
        step: PipelineStep,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<T, FulfillmentError>
    where
        F: Future<Output = Result<T, FulfillmentError>>,
    {
        run.enter(step);
        let guarded = AssertUnwindSafe(call).catch_unwind();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FulfillmentError::Cancelled),
            outcome = tokio::time::timeout(self.config.step_timeout, guarded) => match outcome {
                Err(_) => Err(FulfillmentError::StepTimedOut {
                    step,
                    millis: self.config.step_timeout.as_millis() as u64,
                }),
                Ok(Err(panic)) => Err(FulfillmentError::UnexpectedAutomationError(panic_message(panic))),
                Ok(Ok(result)) => result,
            },
        }
    }

    async fn wait_before_retry(&self, cancel: &CancellationToken) -> Result<(), FulfillmentError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FulfillmentError::Cancelled),
            _ = tokio::time::sleep(self.config.retry_delay) => Ok(()),
        }
    }

    async fn check_delivery_minimum(&self, batch: &RestaurantBatch) -> Result<(), FulfillmentError> {
        // unknown restaurants are left for the site to reject
        let Some(menu) = self.catalog.get_menu(&batch.restaurant).await else {
            return Ok(());
        };
        let subtotal_cents = batch.subtotal_cents();
        if subtotal_cents < menu.delivery_minimum_cents {
            return Err(FulfillmentError::DeliveryMinimumUnmet {
                subtotal_cents,
                minimum_cents: menu.delivery_minimum_cents,
            });
        }
        Ok(())
    }

    /// Everyone in the batch pays, donors included
    async fn payers(&self, batch: &RestaurantBatch) -> Result<Vec<Payer>, FulfillmentError> {
        let mut payers = Vec::with_capacity(batch.members.len());
        for member in &batch.members {
            let profile = self.directory.get(&member.participant_id).await.map_err(store_error)?;
            payers.push(Payer {
                participant_id: member.participant_id.clone(),
                display_name: profile
                    .map(|p| p.display_name)
                    .unwrap_or_else(|| member.participant_id.clone()),
                cap_cents: self.config.per_person_cap_cents,
            });
        }
        Ok(payers)
    }

    async fn choose_point_of_contact(&self, batch: &RestaurantBatch) -> Result<ContactDetails, FulfillmentError> {
        let mut candidates = Vec::new();
        for member in batch.billable_members() {
            if let Some(profile) = self.directory.get(&member.participant_id).await.map_err(store_error)? {
                candidates.push(profile);
            }
        }

        let chosen = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            candidates.choose(&mut *rng).cloned()
        };
        chosen
            .map(|profile| ContactDetails {
                participant_id: profile.participant_id,
                display_name: profile.display_name,
                phone: profile.phone,
            })
            .ok_or_else(|| FulfillmentError::ContactUnavailable(batch.restaurant.clone()))
    }

    /// Stats and pending-order bookkeeping after a real submission. The order
    /// is already placed, so failures here are logged rather than reported.
    /// Pending orders replaced while the batch was in flight are left alone.
    async fn record_success(&self, batch: &RestaurantBatch, success: &PipelineSuccess) {
        let restaurant = batch.restaurant.as_str();

        for amount in &success.amounts {
            if let Err(e) = self.stats.record_spend(&amount.participant_id, restaurant, amount.amount_cents).await {
                error!(participant = %amount.participant_id, "Failed to record spend: {}", e);
            }
        }
        for member in batch.billable_members() {
            for item in member.billable_items() {
                if let Err(e) = self.stats.record_dish(&member.participant_id, restaurant, item.display_name()).await {
                    error!(participant = %member.participant_id, "Failed to record dish: {}", e);
                }
            }
        }

        let contact = &success.contact.participant_id;
        if let Err(e) = self.stats.record_contact(contact).await {
            error!(participant = %contact, "Failed to record contact: {}", e);
        }
        if let Some(submitted) = batch.members.iter().find(|m| &m.participant_id == contact) {
            match self.orders.mark_point_of_contact(submitted).await {
                Ok(true) => {}
                Ok(false) => warn!(participant = %contact, "Order changed during fulfillment, not marking contact"),
                Err(e) => error!(participant = %contact, "Failed to mark point of contact: {}", e),
            }
        }

        if self.config.clear_on_success {
            for member in &batch.members {
                match self.orders.remove_if_unchanged(member).await {
                    Ok(true) => {}
                    Ok(false) => warn!(participant = %member.participant_id, "Order changed during fulfillment, keeping it"),
                    Err(e) => error!(participant = %member.participant_id, "Failed to clear pending order: {}", e),
                }
            }
        }
    }

    async fn publish(&self, batch: &RestaurantBatch, result: &FulfillmentResult) {
        let Some(events) = &self.events else {
            return;
        };

        let (topic, payload) = match &result.outcome {
            FulfillmentOutcome::Success {
                point_of_contact,
                confirmation_ref,
                ..
            } => (
                TOPIC_FULFILLMENT_COMPLETED,
                serde_json::to_string(&FulfillmentCompletedEvent::new(
                    batch.restaurant.clone(),
                    point_of_contact.clone(),
                    confirmation_ref.clone(),
                    batch.members.len(),
                    result.dry_run,
                )),
            ),
            FulfillmentOutcome::Failure {
                messages, participants, ..
            } => (
                TOPIC_FULFILLMENT_FAILED,
                serde_json::to_string(&FulfillmentFailedEvent::new(
                    batch.restaurant.clone(),
                    messages.clone(),
                    participants.clone(),
                    result.dry_run,
                )),
            ),
        };

        match payload {
            Ok(payload) => {
                if let Err(e) = events.publish(topic, &batch.restaurant, &payload).await {
                    error!(topic, "Failed to publish fulfillment event: {}", e);
                }
            }
            Err(e) => error!(topic, "Failed to serialize fulfillment event: {}", e),
        }
    }
}

fn store_error(err: Box<dyn std::error::Error + Send + Sync>) -> FulfillmentError {
    FulfillmentError::Store(err.to_string())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "automation panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use potluck_catalog::{InMemoryCatalog, MenuItem, Restaurant};
    use potluck_core::{
        Allocation, CheckoutTotals, FailureKind, ItemOutcome, ParticipantOrder, ParticipantProfile, ResolvedOrderItem,
        StatsStore,
    };
    use potluck_store::events::LogEventPublisher;
    use potluck_store::memory::{MemoryDirectory, MemoryOrderStore, MemoryStatsStore};
    use std::collections::{HashMap, VecDeque};

    enum Scripted {
        Fail(FulfillmentError),
        Panic,
        Hang,
    }

    /// Checkout that succeeds unless a step has something scripted
    #[derive(Default)]
    struct ScriptedCheckout {
        script: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
        calls: Mutex<Vec<String>>,
        totals: Mutex<Option<CheckoutTotals>>,
        charged: Mutex<HashMap<String, i32>>,
    }

    impl ScriptedCheckout {
        fn on(self, step: &'static str, behavior: Scripted) -> Self {
            self.script.lock().unwrap().entry(step).or_default().push_back(behavior);
            self
        }

        fn with_totals(self, totals: CheckoutTotals) -> Self {
            *self.totals.lock().unwrap() = Some(totals);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, step: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(step)).count()
        }

        async fn enter(&self, step: &'static str, detail: &str) -> Result<(), FulfillmentError> {
            self.calls.lock().unwrap().push(format!("{} {}", step, detail).trim().to_string());
            let next = self.script.lock().unwrap().get_mut(step).and_then(|q| q.pop_front());
            match next {
                None => Ok(()),
                Some(Scripted::Fail(err)) => Err(err),
                Some(Scripted::Panic) => panic!("element not found: {}", step),
                Some(Scripted::Hang) => {
                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        }
    }

    #[async_trait]
    impl CheckoutAutomation for ScriptedCheckout {
        async fn select_time_slot(&self, _slot: NaiveTime) -> Result<(), FulfillmentError> {
            self.charged.lock().unwrap().clear();
            self.enter("time_slot", "").await
        }

        async fn select_restaurant(&self, restaurant: &str) -> Result<(), FulfillmentError> {
            self.enter("restaurant", restaurant).await
        }

        async fn add_items(&self, participant_id: &str, items: &[ResolvedOrderItem]) -> Result<i32, FulfillmentError> {
            self.enter("add_items", participant_id).await?;
            let amount: i32 = items.iter().map(|i| i.subtotal_cents).sum();
            self.charged.lock().unwrap().insert(participant_id.to_string(), amount);
            Ok(amount)
        }

        async fn allocate_payers(&self, payers: &[Payer]) -> Result<CheckoutTotals, FulfillmentError> {
            self.enter("allocate", "").await?;
            if let Some(totals) = self.totals.lock().unwrap().clone() {
                return Ok(totals);
            }
            let charged = self.charged.lock().unwrap();
            let allocations: Vec<Allocation> = payers
                .iter()
                .map(|p| Allocation {
                    participant_id: p.participant_id.clone(),
                    amount_cents: charged.get(&p.participant_id).copied().unwrap_or(0),
                })
                .collect();
            Ok(CheckoutTotals {
                priced_total_cents: allocations.iter().map(|a| a.amount_cents).sum(),
                allocations,
                gratuity_cents: 0,
            })
        }

        async fn adjust_gratuity(&self, gratuity_cents: i32) -> Result<(), FulfillmentError> {
            self.enter("gratuity", &gratuity_cents.to_string()).await
        }

        async fn select_point_of_contact(&self, contact: &ContactDetails) -> Result<(), FulfillmentError> {
            self.enter("contact", &contact.participant_id).await
        }

        async fn submit(&self) -> Result<(), FulfillmentError> {
            self.enter("submit", "").await
        }

        async fn generate_confirmation(&self, restaurant: &str) -> Result<String, FulfillmentError> {
            self.enter("confirmation", restaurant).await?;
            Ok(format!("confirmations/{}.pdf", restaurant.to_lowercase()))
        }
    }

    struct Harness {
        checkout: Arc<ScriptedCheckout>,
        orders: Arc<MemoryOrderStore>,
        directory: Arc<MemoryDirectory>,
        stats: Arc<MemoryStatsStore>,
        events: Arc<LogEventPublisher>,
        orchestrator: FulfillmentOrchestrator,
    }

    fn order(participant: &str, restaurant: &str, subtotal: i32) -> ParticipantOrder {
        let item = ResolvedOrderItem {
            requested_name: "special".to_string(),
            item: Some(MenuItem::new(format!("{} Special", restaurant), subtotal)),
            suggestion: None,
            options: Vec::new(),
            defaults: Vec::new(),
            subtotal_cents: subtotal,
            outcome: ItemOutcome::Matched,
        };
        ParticipantOrder::new(participant.to_string(), restaurant.to_string(), vec![item])
    }

    async fn harness(checkout: ScriptedCheckout, pending: Vec<ParticipantOrder>) -> Harness {
        let checkout = Arc::new(checkout);
        let orders = Arc::new(MemoryOrderStore::new());
        let stats = Arc::new(MemoryStatsStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let events = Arc::new(LogEventPublisher::new());
        let catalog = Arc::new(InMemoryCatalog::with_menus(vec![
            Restaurant::new("Newa", 1000),
            Restaurant::new("Chipotle", 0),
        ]));

        for p in &pending {
            orders.upsert(p.clone()).await.unwrap();
            directory
                .upsert(ParticipantProfile::new(p.participant_id.clone(), p.participant_id.to_uppercase(), "555-0100"))
                .await
                .unwrap();
        }

        let config = OrchestratorConfig {
            step_timeout: Duration::from_millis(200),
            retry_delay: Duration::ZERO,
            ..OrchestratorConfig::default()
        };
        let orchestrator = FulfillmentOrchestrator::new(
            checkout.clone(),
            catalog,
            orders.clone(),
            directory.clone(),
            StatsAggregator::new(stats.clone()),
            config,
        )
        .with_events(events.clone())
        .with_seed(7);

        Harness {
            checkout,
            orders,
            directory,
            stats,
            events,
            orchestrator,
        }
    }

    fn transient() -> Scripted {
        Scripted::Fail(FulfillmentError::TransientAutomationFailure("Navigation Timeout Exceeded".into()))
    }

    #[tokio::test]
    async fn test_successful_run_records_stats_and_clears_orders() {
        let h = harness(
            ScriptedCheckout::default(),
            vec![order("alice", "Newa", 1200), order("bob", "Newa", 900)],
        )
        .await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 1);
        assert_eq!(h.checkout.count("submit"), 1);
        assert!(h.orders.list().await.unwrap().is_empty());

        let record = h.stats.read_all().await.unwrap();
        assert_eq!(record.restaurant("alice", "Newa").unwrap().spend_cents, 1200);
        assert_eq!(record.restaurant("bob", "Newa").unwrap().dish_count("Newa Special"), 1);
        let contacts: u32 = record.participants.values().map(|p| p.contact_count).sum();
        assert_eq!(contacts, 1);

        let published = h.events.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TOPIC_FULFILLMENT_COMPLETED);
    }

    #[tokio::test]
    async fn test_transient_failure_restarts_whole_pipeline() {
        let checkout = ScriptedCheckout::default().on("allocate", transient());
        let h = harness(checkout, vec![order("alice", "Newa", 1200)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);
        assert_eq!(h.checkout.count("time_slot"), 2);
        assert_eq!(h.checkout.count("add_items"), 2);
    }

    #[tokio::test]
    async fn test_retries_stop_after_max_attempts() {
        let checkout = ScriptedCheckout::default()
            .on("restaurant", transient())
            .on("restaurant", transient())
            .on("restaurant", transient())
            .on("restaurant", transient());
        let h = harness(checkout, vec![order("alice", "Newa", 1200)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].attempts, 3);
        assert_eq!(h.checkout.count("time_slot"), 3);
        match &results[0].outcome {
            FulfillmentOutcome::Failure { kind, retryable, participants, .. } => {
                assert_eq!(*kind, FailureKind::TransientAutomationFailure);
                assert!(*retryable);
                assert_eq!(participants, &vec!["alice".to_string()]);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        // nothing submitted, so the order stays pending
        assert_eq!(h.orders.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_restaurant() {
        let checkout = ScriptedCheckout::default().on(
            "restaurant",
            Scripted::Fail(FulfillmentError::RestaurantUnavailable("Newa".into())),
        );
        let h = harness(
            checkout,
            vec![order("alice", "Newa", 1200), order("bob", "Chipotle", 1100)],
        )
        .await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].restaurant, "Newa");
        assert_eq!(results[0].failure_kind(), Some(FailureKind::RestaurantUnavailable));
        assert_eq!(results[0].attempts, 1);
        assert!(results[1].is_success());

        let remaining = h.orders.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].participant_id, "alice");
    }

    #[tokio::test]
    async fn test_dry_run_skips_submit_and_leaves_no_trace() {
        let h = harness(ScriptedCheckout::default(), vec![order("alice", "Newa", 1200)]).await;

        let results = h
            .orchestrator
            .run_pending(RunOptions { dry_run: true }, CancellationToken::new())
            .await
            .unwrap();

        assert!(results[0].is_success());
        assert!(results[0].dry_run);
        assert_eq!(h.checkout.count("submit"), 0);
        assert_eq!(h.checkout.count("confirmation"), 1);
        assert_eq!(h.orders.list().await.unwrap().len(), 1);
        assert!(h.stats.read_all().await.unwrap().participants.is_empty());
    }

    #[tokio::test]
    async fn test_small_shortfall_lowers_gratuity() {
        let checkout = ScriptedCheckout::default().with_totals(CheckoutTotals {
            priced_total_cents: 2500,
            allocations: vec![
                Allocation { participant_id: "alice".into(), amount_cents: 1300 },
                Allocation { participant_id: "bob".into(), amount_cents: 1125 },
            ],
            gratuity_cents: 100,
        });
        let h = harness(checkout, vec![order("alice", "Newa", 1200), order("bob", "Newa", 1000)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert!(results[0].is_success());
        assert!(h.checkout.calls().contains(&"gratuity 24".to_string()));
    }

    #[tokio::test]
    async fn test_budget_exceeded_names_highest_order() {
        let checkout = ScriptedCheckout::default().with_totals(CheckoutTotals {
            priced_total_cents: 2500,
            allocations: vec![
                Allocation { participant_id: "alice".into(), amount_cents: 1300 },
                Allocation { participant_id: "bob".into(), amount_cents: 1000 },
            ],
            gratuity_cents: 300,
        });
        let h = harness(checkout, vec![order("alice", "Newa", 1450), order("bob", "Newa", 900)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].attempts, 1);
        match &results[0].outcome {
            FulfillmentOutcome::Failure { kind, messages, .. } => {
                assert_eq!(*kind, FailureKind::BudgetExceeded);
                assert_eq!(messages[0], "Order exceeded budget by $2.00. alice's order is the highest at $14.50.");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(h.checkout.count("submit"), 0);
    }

    #[tokio::test]
    async fn test_delivery_minimum_checked_before_automation() {
        let h = harness(ScriptedCheckout::default(), vec![order("alice", "Newa", 800)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].failure_kind(), Some(FailureKind::DeliveryMinimumUnmet));
        assert_eq!(results[0].attempts, 0);
        assert!(h.checkout.calls().is_empty());
    }

    #[tokio::test]
    async fn test_panic_becomes_unexpected_error() {
        let checkout = ScriptedCheckout::default().on("add_items", Scripted::Panic);
        let h = harness(checkout, vec![order("alice", "Newa", 1200)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].failure_kind(), Some(FailureKind::UnexpectedAutomationError));
        assert_eq!(results[0].attempts, 1);
        match &results[0].outcome {
            FulfillmentOutcome::Failure { messages, .. } => {
                assert!(messages[0].contains("element not found: add_items"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hung_step_times_out_and_is_retried() {
        let checkout = ScriptedCheckout::default().on("contact", Scripted::Hang);
        let h = harness(checkout, vec![order("alice", "Newa", 1200)]).await;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert!(results[0].is_success());
        assert_eq!(results[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_cancellation_reports_every_batch() {
        let checkout = ScriptedCheckout::default().on("add_items", Scripted::Hang);
        let h = harness(
            checkout,
            vec![order("alice", "Newa", 1200), order("bob", "Chipotle", 1100)],
        )
        .await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let results = h.orchestrator.run_pending(RunOptions::default(), cancel).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(results[1].failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(results[1].attempts, 0);
        assert_eq!(h.checkout.count("restaurant Chipotle"), 0);
    }

    #[tokio::test]
    async fn test_point_of_contact_needs_registered_non_donor() {
        let h = harness(ScriptedCheckout::default(), Vec::new()).await;
        h.orders.upsert(order("zoe", "Chipotle", 1100)).await.unwrap();

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].failure_kind(), Some(FailureKind::ContactUnavailable));
    }

    #[tokio::test]
    async fn test_contact_is_marked_when_orders_are_kept() {
        let mut h = harness(ScriptedCheckout::default(), vec![order("alice", "Newa", 1200)]).await;
        h.orchestrator.config.clear_on_success = false;

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert!(results[0].is_success());
        let kept = h.orders.get("alice").await.unwrap().unwrap();
        assert!(kept.is_point_of_contact);
    }

    #[tokio::test]
    async fn test_reorder_during_run_is_not_cleared() {
        let submitted = order("alice", "Newa", 1200);
        let h = harness(ScriptedCheckout::default(), vec![submitted.clone(), order("bob", "Newa", 900)]).await;
        let batches = group_by_restaurant(h.orders.list().await.unwrap());

        // alice switches restaurants after the batch was grouped
        h.orders.upsert(order("alice", "Chipotle", 1100)).await.unwrap();
        let results = h.orchestrator.run(batches, RunOptions::default(), CancellationToken::new()).await;

        assert!(results[0].is_success());
        let remaining = h.orders.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].participant_id, "alice");
        assert_eq!(remaining[0].restaurant, "Chipotle");
        assert!(!remaining[0].is_point_of_contact);
    }

    #[tokio::test]
    async fn test_contact_must_have_submitted_items() {
        let h = harness(ScriptedCheckout::default(), Vec::new()).await;
        let mut nothing_matched = order("zoe", "Chipotle", 0);
        nothing_matched.items[0].item = None;
        nothing_matched.items[0].outcome = ItemOutcome::Unmatched;
        h.orders.upsert(order("bob", "Chipotle", 1100)).await.unwrap();
        h.orders.upsert(nothing_matched).await.unwrap();
        h.directory
            .upsert(ParticipantProfile::new("zoe", "Zoe", "555-0101"))
            .await
            .unwrap();

        let results = h.orchestrator.run_pending(RunOptions::default(), CancellationToken::new()).await.unwrap();

        assert_eq!(results[0].failure_kind(), Some(FailureKind::ContactUnavailable));
        assert_eq!(h.checkout.count("add_items"), 1);
    }
}
