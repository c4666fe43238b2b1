use async_trait::async_trait;
use potluck_core::{EventPublisher, StoreResult};
use tokio::sync::RwLock;
use tracing::info;

/// Event sink that writes every event to the log and keeps the most recent
/// ones in memory for inspection.
pub struct LogEventPublisher {
    recent: RwLock<Vec<(String, String, String)>>,
    capacity: usize,
}

impl LogEventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            recent: RwLock::new(Vec::new()),
            capacity,
        }
    }

    /// `(topic, key, payload)` oldest first
    pub async fn published(&self) -> Vec<(String, String, String)> {
        self.recent.read().await.clone()
    }
}

impl Default for LogEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> StoreResult<()> {
        info!(topic, key, payload, "Event published");

        let mut recent = self.recent.write().await;
        recent.push((topic.to_string(), key.to_string(), payload.to_string()));
        if recent.len() > self.capacity {
            let overflow = recent.len() - self.capacity;
            recent.drain(..overflow);
        }
        Ok(())
    }
}
