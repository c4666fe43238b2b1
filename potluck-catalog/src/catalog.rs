use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::matching;
use crate::menu::Restaurant;

/// Read-only access to scraped restaurant menus
#[async_trait]
pub trait MenuCatalog: Send + Sync {
    /// Exact lookup by canonical restaurant name
    async fn get_menu(&self, name: &str) -> Option<Restaurant>;

    async fn all_menus(&self) -> Vec<Restaurant>;

    /// Fuzzy lookup by a user-typed restaurant name
    async fn find_restaurant(&self, query: &str) -> Result<Restaurant, CatalogError> {
        let menus = self.all_menus().await;
        matching::best_match(query, menus.iter().map(|r| r.name.as_str()))
            .map(|(idx, _)| menus[idx].clone())
            .ok_or_else(|| CatalogError::RestaurantNotFound(query.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Restaurant not found: {0}")]
    RestaurantNotFound(String),
}

/// In-memory catalog, filled by the menu population job or a snapshot file
pub struct InMemoryCatalog {
    // Insertion order is the order menus were loaded in; fuzzy ties go to the first.
    menus: RwLock<Vec<Restaurant>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            menus: RwLock::new(Vec::new()),
        }
    }

    pub fn with_menus(menus: Vec<Restaurant>) -> Self {
        Self {
            menus: RwLock::new(menus),
        }
    }

    pub async fn len(&self) -> usize {
        self.menus.read().await.len()
    }

    /// Summary of item counts per restaurant, used at startup logging
    pub async fn item_counts(&self) -> HashMap<String, usize> {
        self.menus
            .read()
            .await
            .iter()
            .map(|r| (r.name.clone(), r.items.len()))
            .collect()
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MenuCatalog for InMemoryCatalog {
    async fn get_menu(&self, name: &str) -> Option<Restaurant> {
        self.menus.read().await.iter().find(|r| r.name == name).cloned()
    }

    async fn all_menus(&self) -> Vec<Restaurant> {
        self.menus.read().await.clone()
    }
}
