use potluck_shared::Masked;
use serde::{Deserialize, Serialize};

/// Contact details a participant registers before ordering.
///
/// `display_name` is the name the ordering site knows them by; `phone` is
/// called if they are picked as point of contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantProfile {
    pub participant_id: String,
    pub display_name: String,
    pub phone: Masked<String>,
}

impl ParticipantProfile {
    pub fn new(participant_id: impl Into<String>, display_name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: display_name.into(),
            phone: Masked::new(phone.into()),
        }
    }
}
