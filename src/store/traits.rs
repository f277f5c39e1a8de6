//! Marker persistence contract.

use async_trait::async_trait;

use crate::error::StoreError;

/// Key-value store holding one marker per logical stream.
///
/// Errors must surface as [`StoreError`]; an unreachable store is never
/// reported as an absent key. A key is assumed to have a single writer per
/// run, so implementations need no cross-process locking.
#[async_trait]
pub trait PointerStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
