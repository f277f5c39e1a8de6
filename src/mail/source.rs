//! Remote message source contract.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::mail::types::{ListPage, RawMessage};

/// Trait for mailbox backends: pure I/O, no business logic.
///
/// Listing is newest-first within a page, and pages are ordered newest to
/// oldest. Collection, extraction and classification live elsewhere.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Backend name for logging (e.g. "gmail").
    fn name(&self) -> &str;

    /// Fetch one page of message references matching `query`.
    async fn list_page(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, SourceError>;

    /// Fetch a single message with its full part tree.
    async fn fetch_message(&self, id: &str) -> Result<RawMessage, SourceError>;
}
