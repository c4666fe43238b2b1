use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DishCount {
    pub name: String,
    pub count: u32,
}

/// What one participant spent and ate at one restaurant
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestaurantStats {
    pub spend_cents: i64,
    /// First-seen order, which top-N ranking relies on for ties
    pub dishes: Vec<DishCount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParticipantStats {
    pub contact_count: u32,
    pub restaurants: BTreeMap<String, RestaurantStats>,
}

/// Everything recorded from successful fulfillments
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsRecord {
    pub participants: BTreeMap<String, ParticipantStats>,
}

impl RestaurantStats {
    pub fn dish_count(&self, name: &str) -> u32 {
        self.dishes.iter().find(|d| d.name == name).map(|d| d.count).unwrap_or(0)
    }
}

impl ParticipantStats {
    pub fn total_spend_cents(&self) -> i64 {
        self.restaurants.values().map(|r| r.spend_cents).sum()
    }
}

impl StatsRecord {
    fn restaurant_mut(&mut self, participant: &str, restaurant: &str) -> &mut RestaurantStats {
        self.participants
            .entry(participant.to_string())
            .or_default()
            .restaurants
            .entry(restaurant.to_string())
            .or_default()
    }

    pub fn add_spend(&mut self, participant: &str, restaurant: &str, cents: i32) {
        self.restaurant_mut(participant, restaurant).spend_cents += i64::from(cents);
    }

    pub fn add_dish(&mut self, participant: &str, restaurant: &str, item_name: &str) {
        let stats = self.restaurant_mut(participant, restaurant);
        match stats.dishes.iter_mut().find(|d| d.name == item_name) {
            Some(dish) => dish.count += 1,
            None => stats.dishes.push(DishCount {
                name: item_name.to_string(),
                count: 1,
            }),
        }
    }

    pub fn add_contact(&mut self, participant: &str) {
        self.participants
            .entry(participant.to_string())
            .or_default()
            .contact_count += 1;
    }

    pub fn participant(&self, participant: &str) -> Option<&ParticipantStats> {
        self.participants.get(participant)
    }

    pub fn restaurant(&self, participant: &str, restaurant: &str) -> Option<&RestaurantStats> {
        self.participants.get(participant)?.restaurants.get(restaurant)
    }
}
