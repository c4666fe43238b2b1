use std::collections::HashMap;

use async_trait::async_trait;
use potluck_core::{
    ParticipantDirectory, ParticipantOrder, ParticipantProfile, PendingOrderStore, StatsRecord, StatsStore,
    StoreResult,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::snapshot::SnapshotFile;

/// Apply `change` to a copy of `state`, write the snapshot, then swap the copy
/// in. A failed write leaves `state` as it was.
async fn commit<T, R>(snapshot: &Option<SnapshotFile>, state: &mut T, change: impl FnOnce(&mut T) -> R) -> StoreResult<R>
where
    T: Clone + serde::Serialize,
{
    let Some(file) = snapshot else {
        return Ok(change(state));
    };
    let mut next = state.clone();
    let out = change(&mut next);
    file.save(&next).await?;
    *state = next;
    Ok(out)
}

/// Pending orders kept in first-placed order, optionally mirrored to disk
pub struct MemoryOrderStore {
    orders: RwLock<Vec<ParticipantOrder>>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(Vec::new()),
            snapshot: None,
        }
    }

    pub async fn persistent(snapshot: SnapshotFile) -> StoreResult<Self> {
        let orders: Vec<ParticipantOrder> = snapshot.load().await?;
        info!(path = %snapshot.path().display(), pending = orders.len(), "Restored pending orders");
        Ok(Self {
            orders: RwLock::new(orders),
            snapshot: Some(snapshot),
        })
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PendingOrderStore for MemoryOrderStore {
    async fn list(&self) -> StoreResult<Vec<ParticipantOrder>> {
        Ok(self.orders.read().await.clone())
    }

    async fn get(&self, participant_id: &str) -> StoreResult<Option<ParticipantOrder>> {
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.participant_id == participant_id)
            .cloned())
    }

    async fn upsert(&self, order: ParticipantOrder) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        commit(&self.snapshot, &mut *orders, |orders| {
            match orders.iter_mut().find(|o| o.participant_id == order.participant_id) {
                Some(existing) => {
                    *existing = ParticipantOrder {
                        is_point_of_contact: false,
                        ..order
                    }
                }
                None => orders.push(order),
            }
        })
        .await
    }

    async fn remove(&self, participant_id: &str) -> StoreResult<Option<ParticipantOrder>> {
        let mut orders = self.orders.write().await;
        let Some(pos) = orders.iter().position(|o| o.participant_id == participant_id) else {
            return Ok(None);
        };
        let removed = commit(&self.snapshot, &mut *orders, |orders| orders.remove(pos)).await?;
        Ok(Some(removed))
    }

    async fn remove_if_unchanged(&self, expected: &ParticipantOrder) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let Some(pos) = orders.iter().position(|o| o.same_order_as(expected)) else {
            return Ok(false);
        };
        commit(&self.snapshot, &mut *orders, |orders| {
            orders.remove(pos);
        })
        .await?;
        Ok(true)
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        commit(&self.snapshot, &mut *orders, Vec::clear).await
    }

    async fn mark_point_of_contact(&self, expected: &ParticipantOrder) -> StoreResult<bool> {
        let mut orders = self.orders.write().await;
        let Some(pos) = orders.iter().position(|o| o.same_order_as(expected)) else {
            return Ok(false);
        };
        commit(&self.snapshot, &mut *orders, |orders| orders[pos].is_point_of_contact = true).await?;
        Ok(true)
    }
}

pub struct MemoryStatsStore {
    record: RwLock<StatsRecord>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self {
            record: RwLock::new(StatsRecord::default()),
            snapshot: None,
        }
    }

    pub async fn persistent(snapshot: SnapshotFile) -> StoreResult<Self> {
        let record: StatsRecord = snapshot.load().await?;
        Ok(Self {
            record: RwLock::new(record),
            snapshot: Some(snapshot),
        })
    }
}

impl Default for MemoryStatsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn record_spend(&self, participant_id: &str, restaurant: &str, cents: i32) -> StoreResult<()> {
        let mut record = self.record.write().await;
        commit(&self.snapshot, &mut *record, |r| r.add_spend(participant_id, restaurant, cents)).await
    }

    async fn record_dish(&self, participant_id: &str, restaurant: &str, item_name: &str) -> StoreResult<()> {
        let mut record = self.record.write().await;
        commit(&self.snapshot, &mut *record, |r| r.add_dish(participant_id, restaurant, item_name)).await
    }

    async fn record_contact(&self, participant_id: &str) -> StoreResult<()> {
        let mut record = self.record.write().await;
        commit(&self.snapshot, &mut *record, |r| r.add_contact(participant_id)).await
    }

    async fn read_all(&self) -> StoreResult<StatsRecord> {
        Ok(self.record.read().await.clone())
    }
}

pub struct MemoryDirectory {
    profiles: RwLock<HashMap<String, ParticipantProfile>>,
    snapshot: Option<SnapshotFile>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            snapshot: None,
        }
    }

    pub async fn persistent(snapshot: SnapshotFile) -> StoreResult<Self> {
        let profiles: HashMap<String, ParticipantProfile> = snapshot.load().await?;
        Ok(Self {
            profiles: RwLock::new(profiles),
            snapshot: Some(snapshot),
        })
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParticipantDirectory for MemoryDirectory {
    async fn get(&self, participant_id: &str) -> StoreResult<Option<ParticipantProfile>> {
        Ok(self.profiles.read().await.get(participant_id).cloned())
    }

    async fn upsert(&self, profile: ParticipantProfile) -> StoreResult<()> {
        let mut profiles = self.profiles.write().await;
        commit(&self.snapshot, &mut *profiles, |profiles| {
            profiles.insert(profile.participant_id.clone(), profile);
        })
        .await
    }
}
