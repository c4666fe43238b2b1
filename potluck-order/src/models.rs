use potluck_core::{FailureKind, FulfillmentError, ParticipantOrder, PipelineStep};
use serde::{Deserialize, Serialize};

/// One parsed line of free-form order text, before it meets a menu
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawOrderLine {
    pub item_name: String,
    pub option_names: Vec<String>,
}

impl RawOrderLine {
    pub fn new(item_name: impl Into<String>, option_names: Vec<String>) -> Self {
        Self {
            item_name: item_name.into(),
            option_names,
        }
    }
}

/// All of today's pending orders for one restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestaurantBatch {
    pub restaurant: String,
    pub members: Vec<ParticipantOrder>,
}

impl RestaurantBatch {
    pub fn new(restaurant: impl Into<String>) -> Self {
        Self {
            restaurant: restaurant.into(),
            members: Vec::new(),
        }
    }

    pub fn non_donors(&self) -> impl Iterator<Item = &ParticipantOrder> {
        self.members.iter().filter(|m| !m.is_donor)
    }

    /// Non-donors with at least one item the site can be asked for
    pub fn billable_members(&self) -> impl Iterator<Item = &ParticipantOrder> {
        self.non_donors().filter(|m| m.has_billable_items())
    }

    /// A batch of donors alone never reaches checkout
    pub fn is_submittable(&self) -> bool {
        self.billable_members().next().is_some()
    }

    pub fn subtotal_cents(&self) -> i32 {
        self.billable_members().map(|m| m.subtotal_cents()).sum()
    }

    pub fn participant_ids(&self) -> Vec<String> {
        self.members.iter().map(|m| m.participant_id.clone()).collect()
    }
}

/// What the checkout charged one participant for their items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantAmount {
    pub participant_id: String,
    pub amount_cents: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentOutcome {
    Success {
        point_of_contact: String,
        confirmation_ref: String,
        participant_amounts: Vec<ParticipantAmount>,
    },
    Failure {
        kind: FailureKind,
        messages: Vec<String>,
        retryable: bool,
        /// Everyone in the batch, so each of them can be told
        participants: Vec<String>,
    },
}

/// Per-restaurant result of a fulfillment run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentResult {
    pub restaurant: String,
    pub attempts: u32,
    pub dry_run: bool,
    pub outcome: FulfillmentOutcome,
}

impl FulfillmentResult {
    pub fn failed(batch: &RestaurantBatch, error: &FulfillmentError, attempts: u32, dry_run: bool) -> Self {
        Self {
            restaurant: batch.restaurant.clone(),
            attempts,
            dry_run,
            outcome: FulfillmentOutcome::Failure {
                kind: error.kind(),
                messages: error.messages(),
                retryable: error.is_retryable(),
                participants: batch.participant_ids(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FulfillmentOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            FulfillmentOutcome::Failure { kind, .. } => Some(*kind),
            FulfillmentOutcome::Success { .. } => None,
        }
    }
}

/// Where a restaurant's fulfillment currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running { step: PipelineStep, attempt: u32 },
    Succeeded,
    Failed { retryable: bool },
}
