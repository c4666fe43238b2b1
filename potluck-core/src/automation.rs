use async_trait::async_trait;
use chrono::NaiveTime;
use potluck_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::fulfillment::FulfillmentError;
use crate::orders::ResolvedOrderItem;

/// One person splitting the bill, with their spending cap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payer {
    pub participant_id: String,
    pub display_name: String,
    pub cap_cents: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub participant_id: String,
    pub amount_cents: i32,
}

/// Totals the checkout reports once payers are allocated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutTotals {
    /// Food, tax, fees and gratuity
    pub priced_total_cents: i32,
    pub allocations: Vec<Allocation>,
    pub gratuity_cents: i32,
}

impl CheckoutTotals {
    pub fn allocated_cents(&self) -> i32 {
        self.allocations.iter().map(|a| a.amount_cents).sum()
    }
}

/// Who the restaurant calls on delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactDetails {
    pub participant_id: String,
    pub display_name: String,
    pub phone: Masked<String>,
}

/// A single checkout session on the external ordering website.
///
/// Implementations own the session; the orchestrator calls the steps in
/// order and restarts from `select_time_slot` after a retryable failure, so
/// each implementation must reset its cart when a new attempt begins.
#[async_trait]
pub trait CheckoutAutomation: Send + Sync {
    async fn select_time_slot(&self, slot: NaiveTime) -> Result<(), FulfillmentError>;

    async fn select_restaurant(&self, restaurant: &str) -> Result<(), FulfillmentError>;

    /// Add one participant's items; returns what the site charged for them
    async fn add_items(&self, participant_id: &str, items: &[ResolvedOrderItem]) -> Result<i32, FulfillmentError>;

    async fn allocate_payers(&self, payers: &[Payer]) -> Result<CheckoutTotals, FulfillmentError>;

    async fn adjust_gratuity(&self, gratuity_cents: i32) -> Result<(), FulfillmentError>;

    async fn select_point_of_contact(&self, contact: &ContactDetails) -> Result<(), FulfillmentError>;

    async fn submit(&self) -> Result<(), FulfillmentError>;

    /// Reference to the confirmation document for the restaurant's order
    async fn generate_confirmation(&self, restaurant: &str) -> Result<String, FulfillmentError>;
}
