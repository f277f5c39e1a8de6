//! Rate-limited, retrying wrapper around any [`MessageSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SourceError;
use crate::mail::source::MessageSource;
use crate::mail::types::{ListPage, RawMessage};
use crate::ratelimit::RateLimiter;
use crate::retry::{RetryConfig, retry_with_backoff};

/// Applies the shared rate limiter and exponential backoff to every call.
///
/// A limiter denial surfaces as [`SourceError::RateLimited`], so the retry
/// loop treats it like any other transient fault.
pub struct ResilientSource {
    inner: Arc<dyn MessageSource>,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryConfig,
    acquire_timeout: Option<Duration>,
}

impl ResilientSource {
    pub fn new(inner: Arc<dyn MessageSource>, retry: RetryConfig) -> Self {
        Self {
            inner,
            limiter: None,
            retry,
            acquire_timeout: None,
        }
    }

    /// Share `limiter` across all calls made through this wrapper.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>, timeout: Option<Duration>) -> Self {
        self.limiter = Some(limiter);
        self.acquire_timeout = timeout;
        self
    }

    async fn admit(&self) -> Result<(), SourceError> {
        match &self.limiter {
            Some(limiter) if !limiter.acquire(self.acquire_timeout).await => {
                Err(SourceError::RateLimited { retry_after: None })
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MessageSource for ResilientSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_page(
        &self,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<ListPage, SourceError> {
        retry_with_backoff(&self.retry, "list_page", move || async move {
            self.admit().await?;
            self.inner.list_page(query, page_size, page_token).await
        })
        .await
    }

    async fn fetch_message(&self, id: &str) -> Result<RawMessage, SourceError> {
        retry_with_backoff(&self.retry, "fetch_message", move || async move {
            self.admit().await?;
            self.inner.fetch_message(id).await
        })
        .await
    }
}
