use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveTime;
use potluck_catalog::MenuCatalog;
use potluck_core::{
    Allocation, CheckoutAutomation, CheckoutTotals, ContactDetails, FulfillmentError, Payer, ResolvedOrderItem,
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Sales tax in basis points (625 = 6.25%)
    pub tax_rate_bps: i32,
    pub default_gratuity_cents: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tax_rate_bps: 625,
            default_gratuity_cents: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    slot: Option<NaiveTime>,
    restaurant: Option<String>,
    charged: Vec<(String, i32)>,
    gratuity_cents: Option<i32>,
    contact: Option<String>,
}

/// Checkout automation that prices orders locally instead of driving the
/// ordering website. Used for dry runs and local development.
pub struct SimulatedCheckout {
    catalog: Arc<dyn MenuCatalog>,
    config: SimulationConfig,
    session: Mutex<Session>,
}

impl SimulatedCheckout {
    pub fn new(catalog: Arc<dyn MenuCatalog>, config: SimulationConfig) -> Self {
        Self {
            catalog,
            config,
            session: Mutex::new(Session::default()),
        }
    }

    fn tax_cents(&self, food_cents: i32) -> i32 {
        let tax = i64::from(food_cents) * i64::from(self.config.tax_rate_bps);
        ((tax + 5_000) / 10_000) as i32
    }
}

fn rejected(message: &str) -> FulfillmentError {
    FulfillmentError::StepRejected {
        retryable: false,
        messages: vec![message.to_string()],
    }
}

/// Each payer covers their own food first, then the remainder is spread in
/// payer order up to each cap.
fn allocate(total_cents: i32, payers: &[Payer], charged: &[(String, i32)]) -> Vec<Allocation> {
    let mut allocations: Vec<Allocation> = payers
        .iter()
        .map(|payer| {
            let own = charged
                .iter()
                .filter(|(participant, _)| participant == &payer.participant_id)
                .map(|(_, amount)| *amount)
                .sum::<i32>();
            Allocation {
                participant_id: payer.participant_id.clone(),
                amount_cents: own.min(payer.cap_cents),
            }
        })
        .collect();

    let mut remaining = total_cents - allocations.iter().map(|a| a.amount_cents).sum::<i32>();
    for (allocation, payer) in allocations.iter_mut().zip(payers) {
        if remaining <= 0 {
            break;
        }
        let extra = (payer.cap_cents - allocation.amount_cents).max(0).min(remaining);
        allocation.amount_cents += extra;
        remaining -= extra;
    }
    allocations
}

#[async_trait]
impl CheckoutAutomation for SimulatedCheckout {
    async fn select_time_slot(&self, slot: NaiveTime) -> Result<(), FulfillmentError> {
        let mut session = self.session.lock().await;
        *session = Session {
            slot: Some(slot),
            ..Session::default()
        };
        debug!(%slot, "Delivery slot selected");
        Ok(())
    }

    async fn select_restaurant(&self, restaurant: &str) -> Result<(), FulfillmentError> {
        if self.catalog.get_menu(restaurant).await.is_none() {
            return Err(FulfillmentError::RestaurantUnavailable(restaurant.to_string()));
        }
        let mut session = self.session.lock().await;
        if session.slot.is_none() {
            return Err(rejected("Select a delivery time first"));
        }
        session.restaurant = Some(restaurant.to_string());
        Ok(())
    }

    async fn add_items(&self, participant_id: &str, items: &[ResolvedOrderItem]) -> Result<i32, FulfillmentError> {
        let mut session = self.session.lock().await;
        if session.restaurant.is_none() {
            return Err(rejected("Select a restaurant first"));
        }
        let amount: i32 = items.iter().filter(|i| i.is_billable()).map(|i| i.subtotal_cents).sum();
        session.charged.push((participant_id.to_string(), amount));
        debug!(participant = participant_id, amount, "Items added");
        Ok(amount)
    }

    async fn allocate_payers(&self, payers: &[Payer]) -> Result<CheckoutTotals, FulfillmentError> {
        let session = self.session.lock().await;
        if session.charged.is_empty() {
            return Err(rejected("Cart is empty"));
        }

        let food_cents: i32 = session.charged.iter().map(|(_, amount)| amount).sum();
        let gratuity_cents = session.gratuity_cents.unwrap_or(self.config.default_gratuity_cents);
        let priced_total_cents = food_cents + self.tax_cents(food_cents) + gratuity_cents;

        Ok(CheckoutTotals {
            priced_total_cents,
            allocations: allocate(priced_total_cents, payers, &session.charged),
            gratuity_cents,
        })
    }

    async fn adjust_gratuity(&self, gratuity_cents: i32) -> Result<(), FulfillmentError> {
        if gratuity_cents < 0 {
            return Err(rejected("Gratuity cannot be negative"));
        }
        self.session.lock().await.gratuity_cents = Some(gratuity_cents);
        Ok(())
    }

    async fn select_point_of_contact(&self, contact: &ContactDetails) -> Result<(), FulfillmentError> {
        self.session.lock().await.contact = Some(contact.participant_id.clone());
        debug!(participant = %contact.participant_id, phone = %contact.phone, "Point of contact set");
        Ok(())
    }

    async fn submit(&self) -> Result<(), FulfillmentError> {
        let session = self.session.lock().await;
        let restaurant = session.restaurant.as_deref().unwrap_or_default();
        if session.contact.is_none() {
            return Err(rejected("Select a point of contact first"));
        }
        info!(restaurant, participants = session.charged.len(), "Simulated order submitted");
        Ok(())
    }

    async fn generate_confirmation(&self, restaurant: &str) -> Result<String, FulfillmentError> {
        let slug: String = restaurant
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        Ok(format!("{}-{}", slug, Uuid::new_v4().simple()))
    }
}
