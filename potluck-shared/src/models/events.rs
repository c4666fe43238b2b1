use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPlacedEvent {
    pub event_id: Uuid,
    pub participant_id: String,
    pub restaurant: String,
    pub subtotal_cents: i32,
    pub is_donor: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FulfillmentCompletedEvent {
    pub event_id: Uuid,
    pub restaurant: String,
    pub point_of_contact: String,
    pub confirmation_ref: String,
    pub participant_count: usize,
    pub dry_run: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FulfillmentFailedEvent {
    pub event_id: Uuid,
    pub restaurant: String,
    pub messages: Vec<String>,
    pub participants: Vec<String>,
    pub dry_run: bool,
    pub timestamp: i64,
}

impl FulfillmentCompletedEvent {
    pub fn new(
        restaurant: String,
        point_of_contact: String,
        confirmation_ref: String,
        participant_count: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            restaurant,
            point_of_contact,
            confirmation_ref,
            participant_count,
            dry_run,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl FulfillmentFailedEvent {
    pub fn new(restaurant: String, messages: Vec<String>, participants: Vec<String>, dry_run: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            restaurant,
            messages,
            participants,
            dry_run,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl OrderPlacedEvent {
    pub fn new(participant_id: String, restaurant: String, subtotal_cents: i32, is_donor: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            participant_id,
            restaurant,
            subtotal_cents,
            is_donor,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}
