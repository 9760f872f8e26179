//! In-memory context store
//!
//! Fast, non-persistent storage for development and testing.
//! All data is lost when the process exits.

use async_trait::async_trait;
use dashmap::DashMap;
use flowgate_types::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::traits::ContextStore;

/// In-memory store implementation
pub struct MemoryStore {
    /// Values keyed by (store, key)
    values: DashMap<(String, String), Value>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        info!("Initializing in-memory context store");
        Self {
            values: DashMap::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextStore for MemoryStore {
    async fn get(&self, key: &str, store: &str) -> Result<Option<Value>> {
        Ok(self
            .values
            .get(&(store.to_string(), key.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Value, store: &str) -> Result<()> {
        self.values.insert((store.to_string(), key.to_string()), value);
        debug!(store = %store, key = %key, "Value stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_missing() {
        let store = MemoryStore::new();
        assert_eq!(store.get("state", "default").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_overwrite() {
        let store = MemoryStore::new();
        store.set("state", json!("open"), "default").await.unwrap();
        store.set("state", json!("closed"), "default").await.unwrap();

        assert_eq!(
            store.get("state", "default").await.unwrap(),
            Some(json!("closed"))
        );
        assert_eq!(store.values.len(), 1);
    }

    #[tokio::test]
    async fn test_stores_are_separate() {
        let store = MemoryStore::new();
        store.set("state", json!("open"), "a").await.unwrap();
        store.set("state", json!("queueing"), "b").await.unwrap();

        assert_eq!(store.get("state", "a").await.unwrap(), Some(json!("open")));
        assert_eq!(store.get("state", "b").await.unwrap(), Some(json!("queueing")));
    }
}
