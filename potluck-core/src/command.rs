use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Everything a participant can ask for, already separated from chat text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Place or replace today's order. Without a restaurant, the restaurant
    /// of the participant's current pending order is reused.
    PlaceOrder {
        participant: String,
        restaurant: Option<String>,
        items: String,
    },
    /// Chip in toward a restaurant's order without picking items
    Donate { participant: String, restaurant: String },
    Cancel { participant: String },
    Register {
        participant: String,
        display_name: String,
        phone: String,
    },
    Stats {
        participant: String,
        restaurant: Option<String>,
    },
    GlobalStats,
    Help,
}

impl Command {
    /// Commands that change today's pending orders
    pub fn mutates_orders(&self) -> bool {
        matches!(
            self,
            Command::PlaceOrder { .. } | Command::Donate { .. } | Command::Cancel { .. }
        )
    }

    pub fn participant(&self) -> Option<&str> {
        match self {
            Command::PlaceOrder { participant, .. }
            | Command::Donate { participant, .. }
            | Command::Cancel { participant }
            | Command::Register { participant, .. }
            | Command::Stats { participant, .. } => Some(participant),
            Command::GlobalStats | Command::Help => None,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(participant) = self.participant() {
            if participant.trim().is_empty() {
                return Err(CoreError::ValidationError("participant is required".to_string()));
            }
        }

        match self {
            Command::PlaceOrder { items, .. } if items.trim().is_empty() => {
                Err(CoreError::ValidationError("no items given".to_string()))
            }
            Command::Register { display_name, phone, .. } => {
                if display_name.trim().is_empty() {
                    return Err(CoreError::ValidationError("name is required".to_string()));
                }
                if !phone.chars().any(|c| c.is_ascii_digit()) {
                    return Err(CoreError::ValidationError(format!("'{}' is not a phone number", phone)));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
