use potluck_catalog::format_cents;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Steps of the checkout pipeline, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStep {
    SelectTimeSlot,
    SelectRestaurant,
    AddItems,
    AllocatePayers,
    AdjustGratuity,
    SelectPointOfContact,
    Submit,
    GenerateConfirmation,
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::SelectTimeSlot => "select time slot",
            PipelineStep::SelectRestaurant => "select restaurant",
            PipelineStep::AddItems => "add items",
            PipelineStep::AllocatePayers => "allocate payers",
            PipelineStep::AdjustGratuity => "adjust gratuity",
            PipelineStep::SelectPointOfContact => "select point of contact",
            PipelineStep::Submit => "submit",
            PipelineStep::GenerateConfirmation => "generate confirmation",
        };
        f.write_str(name)
    }
}

/// Why a restaurant's fulfillment failed, without the payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    RestaurantUnavailable,
    DeliveryMinimumUnmet,
    BudgetExceeded,
    TransientAutomationFailure,
    StepRejected,
    UnexpectedAutomationError,
    StepTimedOut,
    ContactUnavailable,
    Cancelled,
    Store,
}

fn dollars(cents: &i32) -> String {
    format_cents(*cents)
}

/// Failures raised by the checkout automation or the orchestrator around it
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("Restaurant does not exist or is closed at this time: {0}")]
    RestaurantUnavailable(String),

    #[error("Delivery minimum not met ({} of {})", dollars(.subtotal_cents), dollars(.minimum_cents))]
    DeliveryMinimumUnmet { subtotal_cents: i32, minimum_cents: i32 },

    #[error("Order exceeded budget by {}. {participant}'s order is the highest at {}.", dollars(.excess_cents), dollars(.highest_cents))]
    BudgetExceeded {
        excess_cents: i32,
        participant: String,
        highest_cents: i32,
    },

    #[error("Transient automation failure: {0}")]
    TransientAutomationFailure(String),

    #[error("{}", .messages.join("; "))]
    StepRejected { retryable: bool, messages: Vec<String> },

    #[error("Order failed for unknown reason: {0}")]
    UnexpectedAutomationError(String),

    #[error("Step '{step}' timed out after {millis}ms")]
    StepTimedOut { step: PipelineStep, millis: u64 },

    #[error("No participant with contact details: {0}")]
    ContactUnavailable(String),

    #[error("Fulfillment run was cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),
}

impl FulfillmentError {
    /// Retryable failures restart the whole pipeline for the batch
    pub fn is_retryable(&self) -> bool {
        match self {
            FulfillmentError::TransientAutomationFailure(_) | FulfillmentError::StepTimedOut { .. } => true,
            FulfillmentError::StepRejected { retryable, .. } => *retryable,
            FulfillmentError::RestaurantUnavailable(_)
            | FulfillmentError::DeliveryMinimumUnmet { .. }
            | FulfillmentError::BudgetExceeded { .. }
            | FulfillmentError::UnexpectedAutomationError(_)
            | FulfillmentError::ContactUnavailable(_)
            | FulfillmentError::Cancelled
            | FulfillmentError::Store(_) => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FulfillmentError::RestaurantUnavailable(_) => FailureKind::RestaurantUnavailable,
            FulfillmentError::DeliveryMinimumUnmet { .. } => FailureKind::DeliveryMinimumUnmet,
            FulfillmentError::BudgetExceeded { .. } => FailureKind::BudgetExceeded,
            FulfillmentError::TransientAutomationFailure(_) => FailureKind::TransientAutomationFailure,
            FulfillmentError::StepRejected { .. } => FailureKind::StepRejected,
            FulfillmentError::UnexpectedAutomationError(_) => FailureKind::UnexpectedAutomationError,
            FulfillmentError::StepTimedOut { .. } => FailureKind::StepTimedOut,
            FulfillmentError::ContactUnavailable(_) => FailureKind::ContactUnavailable,
            FulfillmentError::Cancelled => FailureKind::Cancelled,
            FulfillmentError::Store(_) => FailureKind::Store,
        }
    }

    /// User-facing messages for the result report
    pub fn messages(&self) -> Vec<String> {
        match self {
            FulfillmentError::StepRejected { messages, .. } => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}
