use potluck_catalog::MenuItem;
use serde::{Deserialize, Serialize};

/// How well a requested line matched the restaurant's menu
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemOutcome {
    Matched,
    /// Item found, but at least one requested option was ignored
    PartialOptions,
    Unmatched,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionStatus {
    /// Explicitly requested and found on the item
    Selected,
    /// Pre-selected by the menu and not overridden
    Default,
    /// Requested but not found; the item is still ordered without it
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedOption {
    pub name: String,
    pub price_cents: i32,
    pub status: OptionStatus,
}

/// A participant's line item after resolution against a menu
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedOrderItem {
    /// What the participant typed
    pub requested_name: String,
    pub item: Option<MenuItem>,
    /// Closest menu name when the item could not be matched
    pub suggestion: Option<String>,
    pub options: Vec<ResolvedOption>,
    pub defaults: Vec<ResolvedOption>,
    pub subtotal_cents: i32,
    pub outcome: ItemOutcome,
}

impl ResolvedOrderItem {
    /// Only matched items are submitted and paid for
    pub fn is_billable(&self) -> bool {
        self.item.is_some()
    }

    /// Menu name when matched, otherwise what was typed
    pub fn display_name(&self) -> &str {
        self.item
            .as_ref()
            .map(|i| i.name.as_str())
            .unwrap_or(&self.requested_name)
    }

    pub fn selected_options(&self) -> impl Iterator<Item = &ResolvedOption> {
        self.options.iter().filter(|o| o.status == OptionStatus::Selected)
    }

    pub fn ignored_options(&self) -> impl Iterator<Item = &ResolvedOption> {
        self.options.iter().filter(|o| o.status == OptionStatus::Ignored)
    }
}

/// A participant's pending order for today
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantOrder {
    pub participant_id: String,
    pub restaurant: String,
    pub items: Vec<ResolvedOrderItem>,
    pub is_donor: bool,
    #[serde(default)]
    pub is_point_of_contact: bool,
}

impl ParticipantOrder {
    pub fn new(participant_id: String, restaurant: String, items: Vec<ResolvedOrderItem>) -> Self {
        Self {
            participant_id,
            restaurant,
            items,
            is_donor: false,
            is_point_of_contact: false,
        }
    }

    /// A donor chips in toward the restaurant's order without picking items
    pub fn donor(participant_id: String, restaurant: String) -> Self {
        Self {
            participant_id,
            restaurant,
            items: Vec::new(),
            is_donor: true,
            is_point_of_contact: false,
        }
    }

    pub fn billable_items(&self) -> impl Iterator<Item = &ResolvedOrderItem> {
        self.items.iter().filter(|i| i.is_billable())
    }

    pub fn has_billable_items(&self) -> bool {
        self.billable_items().next().is_some()
    }

    pub fn subtotal_cents(&self) -> i32 {
        self.billable_items().map(|i| i.subtotal_cents).sum()
    }

    /// Same participant, restaurant and items; the point-of-contact flag is ignored
    pub fn same_order_as(&self, other: &ParticipantOrder) -> bool {
        self.participant_id == other.participant_id
            && self.restaurant == other.restaurant
            && self.is_donor == other.is_donor
            && self.items == other.items
    }
}
