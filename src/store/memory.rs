//! In-process pointer store.
//!
//! Suitable for single runs and tests. Markers are lost on restart, so a
//! restarted process bootstraps again from the newest messages.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::PointerStore;

#[derive(Debug, Default)]
pub struct InMemoryPointerStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `key = value`.
    pub fn with_marker(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            values: RwLock::new(HashMap::from([(key.into(), value.into())])),
        }
    }
}

#[async_trait]
impl PointerStore for InMemoryPointerStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
