use std::fmt;
use std::sync::Arc;

use potluck_catalog::format_cents;
use potluck_core::{StatsRecord, StatsStore, StoreResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_DISHES: usize = 3;

/// The `k` entries with the highest counts, highest first.
///
/// Entries are taken in iteration order and a later entry only displaces an
/// earlier one with a strictly smaller count, so ties keep first-seen order.
pub fn top_n<T>(entries: impl IntoIterator<Item = (T, u32)>, k: usize) -> Vec<(T, u32)> {
    let mut slots: Vec<(T, u32)> = Vec::with_capacity(k + 1);
    if k == 0 {
        return slots;
    }

    for (key, count) in entries {
        match slots.iter().position(|(_, c)| *c < count) {
            Some(pos) => {
                slots.insert(pos, (key, count));
                slots.truncate(k);
            }
            None if slots.len() < k => slots.push((key, count)),
            None => {}
        }
    }
    slots
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopDish {
    pub name: String,
    pub restaurant: String,
    pub count: u32,
}

/// Answer to a stats query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSummary {
    pub total_spend_cents: i64,
    /// Only reported for a single participant
    pub contact_count: Option<u32>,
    pub top_dishes: Vec<TopDish>,
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Total spent: {}", format_cents(clamp_cents(self.total_spend_cents)))?;
        if let Some(count) = self.contact_count {
            write!(f, "\n\nTotal calls received: {}", count)?;
        }
        if !self.top_dishes.is_empty() {
            write!(f, "\n\nTop dishes:")?;
            for dish in &self.top_dishes {
                write!(f, "\n  {} of \"{}\" from {}", dish.count, dish.name, dish.restaurant)?;
            }
        }
        Ok(())
    }
}

fn clamp_cents(cents: i64) -> i32 {
    cents.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Participant totals, optionally narrowed to one restaurant
pub fn participant_summary(record: &StatsRecord, participant: &str, restaurant: Option<&str>, k: usize) -> StatsSummary {
    let Some(stats) = record.participant(participant) else {
        return StatsSummary {
            total_spend_cents: 0,
            contact_count: Some(0),
            top_dishes: Vec::new(),
        };
    };

    let restaurants = stats
        .restaurants
        .iter()
        .filter(|(name, _)| restaurant.map_or(true, |r| r == name.as_str()));

    let mut total_spend_cents = 0;
    let mut dishes = Vec::new();
    for (name, entry) in restaurants {
        total_spend_cents += entry.spend_cents;
        dishes.extend(entry.dishes.iter().map(|d| ((d.name.as_str(), name.as_str()), d.count)));
    }

    StatsSummary {
        total_spend_cents,
        contact_count: Some(stats.contact_count),
        top_dishes: to_top_dishes(top_n(dishes, k)),
    }
}

/// Everyone's spend, and dishes counted across all participants
pub fn global_summary(record: &StatsRecord, k: usize) -> StatsSummary {
    let mut total_spend_cents = 0;
    let mut dishes: Vec<((&str, &str), u32)> = Vec::new();

    for stats in record.participants.values() {
        for (restaurant, entry) in &stats.restaurants {
            total_spend_cents += entry.spend_cents;
            for dish in &entry.dishes {
                let key = (dish.name.as_str(), restaurant.as_str());
                match dishes.iter_mut().find(|(existing, _)| *existing == key) {
                    Some((_, count)) => *count += dish.count,
                    None => dishes.push((key, dish.count)),
                }
            }
        }
    }

    StatsSummary {
        total_spend_cents,
        contact_count: None,
        top_dishes: to_top_dishes(top_n(dishes, k)),
    }
}

fn to_top_dishes(ranked: Vec<((&str, &str), u32)>) -> Vec<TopDish> {
    ranked
        .into_iter()
        .map(|((name, restaurant), count)| TopDish {
            name: name.to_string(),
            restaurant: restaurant.to_string(),
            count,
        })
        .collect()
}

/// Records and queries long-lived statistics over a [`StatsStore`]
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn StatsStore>,
    top_k: usize,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_DISHES,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub async fn record_spend(&self, participant: &str, restaurant: &str, cents: i32) -> StoreResult<()> {
        self.store.record_spend(participant, restaurant, cents).await
    }

    pub async fn record_dish(&self, participant: &str, restaurant: &str, item_name: &str) -> StoreResult<()> {
        self.store.record_dish(participant, restaurant, item_name).await
    }

    pub async fn record_contact(&self, participant: &str) -> StoreResult<()> {
        self.store.record_contact(participant).await
    }

    pub async fn participant(&self, participant: &str, restaurant: Option<&str>) -> StoreResult<StatsSummary> {
        let record = self.store.read_all().await?;
        Ok(participant_summary(&record, participant, restaurant, self.top_k))
    }

    pub async fn global(&self) -> StoreResult<StatsSummary> {
        let record = self.store.read_all().await?;
        Ok(global_summary(&record, self.top_k))
    }
}
