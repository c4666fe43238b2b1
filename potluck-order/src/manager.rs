use std::sync::Arc;

use chrono::{Local, NaiveTime};
use potluck_catalog::{format_cents, MenuCatalog, Restaurant};
use potluck_core::events::TOPIC_ORDER_PLACED;
use potluck_core::{
    Command, EventPublisher, OptionStatus, ParticipantDirectory, ParticipantOrder, ParticipantProfile,
    PendingOrderStore, ResolvedOrderItem,
};
use potluck_shared::OrderPlacedEvent;
use serde::Serialize;
use tracing::{error, info};

use crate::parser::parse_order_text;
use crate::resolver::ItemResolver;
use crate::stats::{StatsAggregator, StatsSummary};

const HELP_TEXT: &str = "\
place_order: order from a restaurant, e.g. \"chicken momo (large), aquafina\"
donate: chip in toward a restaurant's order without picking items
cancel: drop today's order
register: save the name and phone number used for delivery
stats / global_stats: spending and favourite dishes";

/// When ordering closes and how much one person should spend
#[derive(Debug, Clone)]
pub struct OrderingPolicy {
    /// Orders can no longer change from this time of day
    pub cutoff: Option<NaiveTime>,
    pub per_person_cap_cents: i32,
}

impl Default for OrderingPolicy {
    fn default() -> Self {
        Self {
            cutoff: None,
            per_person_cap_cents: 2500,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Invalid command: {0}")]
    Invalid(String),

    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(String),

    #[error("Nothing on the {restaurant} menu matched: {}", .unmatched.join(", "))]
    NoBillableItems { restaurant: String, unmatched: Vec<String> },

    #[error("No pending order for {0}")]
    NoPendingOrder(String),

    #[error("Ordering closed at {0}")]
    OrderingClosed(NaiveTime),

    #[error("Store error: {0}")]
    Store(String),
}

/// What a participant is told after a command
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    OrderPlaced {
        restaurant: String,
        items: Vec<ResolvedOrderItem>,
        subtotal_cents: i32,
        restaurant_total_cents: i32,
        delivery_minimum_cents: i32,
        warnings: Vec<String>,
    },
    DonationRecorded { restaurant: String },
    OrderCancelled { restaurant: String },
    Registered { participant: String, display_name: String },
    Stats(StatsSummary),
    Help { text: String },
}

impl CommandReply {
    /// Plain-text rendering for chat
    pub fn text(&self) -> String {
        match self {
            CommandReply::OrderPlaced {
                restaurant,
                items,
                subtotal_cents,
                restaurant_total_cents,
                delivery_minimum_cents,
                warnings,
            } => {
                let mut lines = vec![format!("Your order from {}:", restaurant)];
                for item in items.iter().filter(|i| i.is_billable()) {
                    lines.push(format!("  {} {}", describe_item(item), format_cents(item.subtotal_cents)));
                }
                lines.push(format!("Your total: {}", format_cents(*subtotal_cents)));
                lines.push(format!(
                    "{} total so far: {} (delivery minimum {})",
                    restaurant,
                    format_cents(*restaurant_total_cents),
                    format_cents(*delivery_minimum_cents)
                ));
                lines.extend(warnings.iter().cloned());
                lines.join("\n")
            }
            CommandReply::DonationRecorded { restaurant } => {
                format!("You're chipping in to the {} order.", restaurant)
            }
            CommandReply::OrderCancelled { restaurant } => format!("Cancelled your order from {}.", restaurant),
            CommandReply::Registered { display_name, .. } => format!("Registered {}.", display_name),
            CommandReply::Stats(summary) => summary.to_string(),
            CommandReply::Help { text } => text.clone(),
        }
    }
}

fn describe_item(item: &ResolvedOrderItem) -> String {
    let chosen: Vec<&str> = item
        .options
        .iter()
        .chain(item.defaults.iter())
        .filter(|o| o.status != OptionStatus::Ignored)
        .map(|o| o.name.as_str())
        .collect();
    if chosen.is_empty() {
        item.display_name().to_string()
    } else {
        format!("{} ({})", item.display_name(), chosen.join(", "))
    }
}

fn describe_unmatched(item: &ResolvedOrderItem) -> String {
    match &item.suggestion {
        Some(suggestion) => format!("'{}' (did you mean {}?)", item.requested_name, suggestion),
        None => format!("'{}'", item.requested_name),
    }
}

fn item_warnings(restaurant: &str, items: &[ResolvedOrderItem]) -> Vec<String> {
    let mut warnings = Vec::new();
    for item in items {
        if !item.is_billable() {
            warnings.push(format!("Couldn't find {} at {}", describe_unmatched(item), restaurant));
            continue;
        }
        for option in item.ignored_options() {
            warnings.push(format!("Ignored option '{}' for {}", option.name, item.display_name()));
        }
    }
    warnings
}

fn store_error(err: Box<dyn std::error::Error + Send + Sync>) -> ResolutionError {
    ResolutionError::Store(err.to_string())
}

/// Turns participant commands into pending orders, profiles and stats replies
pub struct OrderDesk {
    catalog: Arc<dyn MenuCatalog>,
    orders: Arc<dyn PendingOrderStore>,
    directory: Arc<dyn ParticipantDirectory>,
    stats: StatsAggregator,
    resolver: ItemResolver,
    policy: OrderingPolicy,
    events: Option<Arc<dyn EventPublisher>>,
}

impl OrderDesk {
    pub fn new(
        catalog: Arc<dyn MenuCatalog>,
        orders: Arc<dyn PendingOrderStore>,
        directory: Arc<dyn ParticipantDirectory>,
        stats: StatsAggregator,
        resolver: ItemResolver,
        policy: OrderingPolicy,
    ) -> Self {
        Self {
            catalog,
            orders,
            directory,
            stats,
            resolver,
            policy,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn handle(&self, command: Command) -> Result<CommandReply, ResolutionError> {
        self.handle_at(command, Local::now().time()).await
    }

    /// Handle a command as if it arrived at `now`
    pub async fn handle_at(&self, command: Command, now: NaiveTime) -> Result<CommandReply, ResolutionError> {
        command.validate().map_err(|e| ResolutionError::Invalid(e.to_string()))?;

        if command.mutates_orders() {
            if let Some(cutoff) = self.policy.cutoff {
                if now >= cutoff {
                    return Err(ResolutionError::OrderingClosed(cutoff));
                }
            }
        }

        match command {
            Command::PlaceOrder {
                participant,
                restaurant,
                items,
            } => self.place_order(&participant, restaurant.as_deref(), &items).await,
            Command::Donate { participant, restaurant } => self.donate(&participant, &restaurant).await,
            Command::Cancel { participant } => self.cancel(&participant).await,
            Command::Register {
                participant,
                display_name,
                phone,
            } => {
                let profile = ParticipantProfile::new(participant.clone(), display_name.trim(), phone.trim());
                self.directory.upsert(profile).await.map_err(store_error)?;
                info!(participant = %participant, "Participant registered");
                Ok(CommandReply::Registered {
                    participant,
                    display_name: display_name.trim().to_string(),
                })
            }
            Command::Stats { participant, restaurant } => {
                let restaurant = match restaurant {
                    Some(query) => Some(self.find_restaurant(&query).await?.name),
                    None => None,
                };
                let summary = self
                    .stats
                    .participant(&participant, restaurant.as_deref())
                    .await
                    .map_err(store_error)?;
                Ok(CommandReply::Stats(summary))
            }
            Command::GlobalStats => {
                let summary = self.stats.global().await.map_err(store_error)?;
                Ok(CommandReply::Stats(summary))
            }
            Command::Help => Ok(CommandReply::Help {
                text: HELP_TEXT.to_string(),
            }),
        }
    }

    async fn place_order(
        &self,
        participant: &str,
        restaurant: Option<&str>,
        text: &str,
    ) -> Result<CommandReply, ResolutionError> {
        let menu = match restaurant {
            Some(query) => self.find_restaurant(query).await?,
            None => {
                let pending = self
                    .orders
                    .get(participant)
                    .await
                    .map_err(store_error)?
                    .ok_or_else(|| ResolutionError::RestaurantNotFound("no restaurant given".to_string()))?;
                self.catalog
                    .get_menu(&pending.restaurant)
                    .await
                    .ok_or(ResolutionError::RestaurantNotFound(pending.restaurant))?
            }
        };

        let resolved = self.resolver.resolve_all(&parse_order_text(text), &menu);
        let order = ParticipantOrder::new(participant.to_string(), menu.name.clone(), resolved);
        if !order.has_billable_items() {
            return Err(ResolutionError::NoBillableItems {
                restaurant: menu.name,
                unmatched: order.items.iter().map(describe_unmatched).collect(),
            });
        }

        let subtotal_cents = order.subtotal_cents();
        let items = order.items.clone();
        self.orders.upsert(order).await.map_err(store_error)?;
        info!(participant, restaurant = %menu.name, subtotal_cents, "Order placed");
        self.publish_order_placed(participant, &menu.name, subtotal_cents, false).await;

        let restaurant_total_cents = self.restaurant_total(&menu).await?;
        let mut warnings = item_warnings(&menu.name, &items);
        if subtotal_cents > self.policy.per_person_cap_cents {
            warnings.push(format!(
                "Your order is {} over the {} limit",
                format_cents(subtotal_cents - self.policy.per_person_cap_cents),
                format_cents(self.policy.per_person_cap_cents)
            ));
        }
        if restaurant_total_cents < menu.delivery_minimum_cents {
            warnings.push(format!(
                "{} needs {} more to reach its delivery minimum",
                menu.name,
                format_cents(menu.delivery_minimum_cents - restaurant_total_cents)
            ));
        }

        Ok(CommandReply::OrderPlaced {
            restaurant: menu.name,
            items,
            subtotal_cents,
            restaurant_total_cents,
            delivery_minimum_cents: menu.delivery_minimum_cents,
            warnings,
        })
    }

    async fn donate(&self, participant: &str, restaurant: &str) -> Result<CommandReply, ResolutionError> {
        let menu = self.find_restaurant(restaurant).await?;
        self.orders
            .upsert(ParticipantOrder::donor(participant.to_string(), menu.name.clone()))
            .await
            .map_err(store_error)?;
        info!(participant, restaurant = %menu.name, "Donation recorded");
        self.publish_order_placed(participant, &menu.name, 0, true).await;
        Ok(CommandReply::DonationRecorded { restaurant: menu.name })
    }

    async fn cancel(&self, participant: &str) -> Result<CommandReply, ResolutionError> {
        let removed = self
            .orders
            .remove(participant)
            .await
            .map_err(store_error)?
            .ok_or_else(|| ResolutionError::NoPendingOrder(participant.to_string()))?;
        info!(participant, restaurant = %removed.restaurant, "Order cancelled");
        Ok(CommandReply::OrderCancelled {
            restaurant: removed.restaurant,
        })
    }

    async fn find_restaurant(&self, query: &str) -> Result<Restaurant, ResolutionError> {
        self.catalog
            .find_restaurant(query)
            .await
            .map_err(|_| ResolutionError::RestaurantNotFound(query.to_string()))
    }

    async fn restaurant_total(&self, menu: &Restaurant) -> Result<i32, ResolutionError> {
        let pending = self.orders.list().await.map_err(store_error)?;
        Ok(pending
            .iter()
            .filter(|o| o.restaurant == menu.name && !o.is_donor)
            .map(|o| o.subtotal_cents())
            .sum())
    }

    async fn publish_order_placed(&self, participant: &str, restaurant: &str, subtotal_cents: i32, is_donor: bool) {
        let Some(events) = &self.events else {
            return;
        };
        let event = OrderPlacedEvent::new(participant.to_string(), restaurant.to_string(), subtotal_cents, is_donor);
        match serde_json::to_string(&event) {
            Ok(payload) => {
                if let Err(e) = events.publish(TOPIC_ORDER_PLACED, participant, &payload).await {
                    error!("Failed to publish order event: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize order event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potluck_catalog::{InMemoryCatalog, MenuItem, MenuOption, OptionSet};
    use potluck_core::ItemOutcome;
    use potluck_store::events::LogEventPublisher;
    use potluck_store::memory::{MemoryDirectory, MemoryOrderStore, MemoryStatsStore};

    struct Fixture {
        desk: OrderDesk,
        orders: Arc<MemoryOrderStore>,
        directory: Arc<MemoryDirectory>,
        events: Arc<LogEventPublisher>,
    }

    fn menus() -> Vec<Restaurant> {
        vec![
            Restaurant::new("Newa", 1700)
                .with_item(
                    MenuItem::new("Chicken Momo Jhol", 800).with_option_set(
                        OptionSet::exclusive(
                            "Size",
                            vec![MenuOption::new("Small", 0), MenuOption::new("Large", 100)],
                        ),
                        Some("Small"),
                    ),
                )
                .with_item(MenuItem::new("Goat Curry Feast", 2600)),
            Restaurant::new("Sub Shop", 0)
                .with_item(MenuItem::new("Aquafina", 150))
                .with_item(MenuItem::new("Chicken Pesto Sub", 950)),
        ]
    }

    fn fixture(policy: OrderingPolicy) -> Fixture {
        let orders = Arc::new(MemoryOrderStore::new());
        let directory = Arc::new(MemoryDirectory::new());
        let events = Arc::new(LogEventPublisher::new());
        let desk = OrderDesk::new(
            Arc::new(InMemoryCatalog::with_menus(menus())),
            orders.clone(),
            directory.clone(),
            StatsAggregator::new(Arc::new(MemoryStatsStore::new())),
            ItemResolver::default(),
            policy,
        )
        .with_events(events.clone());
        Fixture {
            desk,
            orders,
            directory,
            events,
        }
    }

    fn place(participant: &str, restaurant: Option<&str>, items: &str) -> Command {
        Command::PlaceOrder {
            participant: participant.to_string(),
            restaurant: restaurant.map(str::to_string),
            items: items.to_string(),
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_place_order_resolves_and_totals() {
        let f = fixture(OrderingPolicy::default());

        let reply = f
            .desk
            .handle_at(place("alice", Some("newa"), "chicken momo, chicken momo (large)"), noon())
            .await
            .unwrap();

        match &reply {
            CommandReply::OrderPlaced {
                restaurant,
                items,
                subtotal_cents,
                restaurant_total_cents,
                warnings,
                ..
            } => {
                assert_eq!(restaurant, "Newa");
                assert_eq!(items.len(), 2);
                assert_eq!(*subtotal_cents, 1700);
                assert_eq!(*restaurant_total_cents, 1700);
                assert!(warnings.is_empty(), "{:?}", warnings);
            }
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(reply.text().contains("Chicken Momo Jhol (Large) $9.00"));
        assert_eq!(f.events.published().await[0].0, TOPIC_ORDER_PLACED);
    }

    #[tokio::test]
    async fn test_replacing_order_keeps_one_entry() {
        let f = fixture(OrderingPolicy::default());
        f.desk.handle_at(place("alice", Some("newa"), "chicken momo"), noon()).await.unwrap();
        f.desk.handle_at(place("bob", Some("sub shop"), "aquafina"), noon()).await.unwrap();
        f.desk.handle_at(place("alice", None, "chicken momo (large)"), noon()).await.unwrap();

        let pending = f.orders.list().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].participant_id, "alice");
        assert_eq!(pending[0].restaurant, "Newa");
        assert_eq!(pending[0].subtotal_cents(), 900);
    }

    #[tokio::test]
    async fn test_missing_restaurant_without_pending_order() {
        let f = fixture(OrderingPolicy::default());
        let err = f.desk.handle_at(place("alice", None, "chicken momo"), noon()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::RestaurantNotFound(_)));

        let err = f
            .desk
            .handle_at(place("alice", Some("zzzz"), "chicken momo"), noon())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::RestaurantNotFound(_)));
    }

    #[tokio::test]
    async fn test_order_with_nothing_matched_is_rejected() {
        let f = fixture(OrderingPolicy::default());
        let err = f
            .desk
            .handle_at(place("alice", Some("sub shop"), "chicken choila"), noon())
            .await
            .unwrap_err();

        match err {
            ResolutionError::NoBillableItems { restaurant, unmatched } => {
                assert_eq!(restaurant, "Sub Shop");
                assert_eq!(unmatched, vec!["'chicken choila' (did you mean Chicken Pesto Sub?)"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(f.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partial_order_warns_about_unmatched_and_cap() {
        let f = fixture(OrderingPolicy::default());
        let reply = f
            .desk
            .handle_at(place("alice", Some("newa"), "goat curry feast, chicken choila"), noon())
            .await
            .unwrap();

        match reply {
            CommandReply::OrderPlaced { items, warnings, subtotal_cents, .. } => {
                assert_eq!(items[1].outcome, ItemOutcome::Unmatched);
                assert_eq!(subtotal_cents, 2600);
                assert!(warnings.iter().any(|w| w.starts_with("Couldn't find 'chicken choila'")));
                assert!(warnings.iter().any(|w| w == "Your order is $1.00 over the $25.00 limit"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delivery_minimum_shortfall_is_reported() {
        let f = fixture(OrderingPolicy::default());
        let reply = f
            .desk
            .handle_at(place("alice", Some("newa"), "chicken momo"), noon())
            .await
            .unwrap();

        match reply {
            CommandReply::OrderPlaced { warnings, .. } => {
                assert_eq!(warnings, vec!["Newa needs $9.00 more to reach its delivery minimum"]);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cutoff_blocks_order_changes_only() {
        let f = fixture(OrderingPolicy {
            cutoff: NaiveTime::from_hms_opt(11, 0, 0),
            ..OrderingPolicy::default()
        });

        let err = f
            .desk
            .handle_at(place("alice", Some("newa"), "chicken momo"), noon())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::OrderingClosed(_)));

        let reply = f.desk.handle_at(Command::GlobalStats, noon()).await.unwrap();
        assert!(matches!(reply, CommandReply::Stats(_)));
    }

    #[tokio::test]
    async fn test_donate_and_cancel() {
        let f = fixture(OrderingPolicy::default());
        let donate = Command::Donate {
            participant: "dan".to_string(),
            restaurant: "newa".to_string(),
        };
        let reply = f.desk.handle_at(donate, noon()).await.unwrap();
        assert_eq!(reply.text(), "You're chipping in to the Newa order.");
        assert!(f.orders.get("dan").await.unwrap().unwrap().is_donor);

        let cancel = Command::Cancel {
            participant: "dan".to_string(),
        };
        let reply = f.desk.handle_at(cancel.clone(), noon()).await.unwrap();
        assert_eq!(reply, CommandReply::OrderCancelled { restaurant: "Newa".to_string() });

        let err = f.desk.handle_at(cancel, noon()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NoPendingOrder(_)));
    }

    #[tokio::test]
    async fn test_register_and_invalid_commands() {
        let f = fixture(OrderingPolicy::default());
        let register = Command::Register {
            participant: "alice".to_string(),
            display_name: " Alice Smith ".to_string(),
            phone: "555-0100".to_string(),
        };
        f.desk.handle_at(register, noon()).await.unwrap();

        let profile = f.directory.get("alice").await.unwrap().unwrap();
        assert_eq!(profile.display_name, "Alice Smith");
        assert_eq!(profile.phone.expose(), "555-0100");

        let err = f.desk.handle_at(place(" ", Some("newa"), "momo"), noon()).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Invalid(_)));
    }
}
