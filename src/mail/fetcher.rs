//! Per-message fetch and extraction.
//!
//! Listing stays sequential (its stop condition depends on order), but
//! bodies can be fetched concurrently. Either way a failing message is
//! logged and left out; it never aborts its siblings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::error::ConfigError;
use crate::mail::extract::extract_summary;
use crate::mail::source::MessageSource;
use crate::mail::types::MessageSummary;

pub const DEFAULT_CONCURRENCY: usize = 10;

/// How message bodies are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Sequential,
    /// At most `max_concurrent` fetches in flight.
    Concurrent { max_concurrent: usize },
}

impl Default for FetchMode {
    fn default() -> Self {
        Self::Concurrent {
            max_concurrent: DEFAULT_CONCURRENCY,
        }
    }
}

impl FetchMode {
    /// Parse `sequential` / `concurrent`, using `concurrency` for the latter.
    pub fn parse(mode: &str, concurrency: usize) -> Result<Self, ConfigError> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent {
                max_concurrent: concurrency.max(1),
            }),
            other => Err(ConfigError::InvalidValue {
                key: "FETCH_MODE".into(),
                message: format!("expected sequential or concurrent, got {other:?}"),
            }),
        }
    }
}

impl FromStr for FetchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_CONCURRENCY)
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Concurrent { max_concurrent } => write!(f, "concurrent({max_concurrent})"),
        }
    }
}

/// Fetches raw messages and turns them into summaries.
pub struct Fetcher {
    source: Arc<dyn MessageSource>,
    mode: FetchMode,
    head_max_chars: usize,
    /// Per-cycle cap on fetched messages.
    max_batch: usize,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn MessageSource>,
        mode: FetchMode,
        head_max_chars: usize,
        max_batch: usize,
    ) -> Self {
        Self {
            source,
            mode,
            head_max_chars,
            max_batch: max_batch.max(1),
        }
    }

    /// Summaries for `ids`, in input order, minus the ones that failed.
    ///
    /// Ids beyond the per-cycle cap are dropped with a warning.
    pub async fn fetch_summaries(&self, ids: &[String]) -> Vec<MessageSummary> {
        let ids = if ids.len() > self.max_batch {
            warn!(
                requested = ids.len(),
                cap = self.max_batch,
                "Batch exceeds per-cycle fetch cap, truncating"
            );
            &ids[..self.max_batch]
        } else {
            ids
        };

        let summaries: Vec<MessageSummary> = match self.mode {
            FetchMode::Sequential => {
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(summary) = self.fetch_one(id).await {
                        out.push(summary);
                    }
                }
                out
            }
            FetchMode::Concurrent { max_concurrent } => {
                let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
                let tasks = ids.iter().map(|id| {
                    let permits = Arc::clone(&permits);
                    async move {
                        let _permit = permits.acquire_owned().await.ok()?;
                        self.fetch_one(id).await
                    }
                });
                join_all(tasks).await.into_iter().flatten().collect()
            }
        };

        info!(
            requested = ids.len(),
            fetched = summaries.len(),
            mode = %self.mode,
            "Fetched message summaries"
        );
        summaries
    }

    async fn fetch_one(&self, id: &str) -> Option<MessageSummary> {
        let raw = match self.source.fetch_message(id).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(id, error = %e, "Failed to fetch message, skipping");
                return None;
            }
        };
        match extract_summary(&raw, self.head_max_chars) {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(id, error = %e, "Failed to extract message, skipping");
                None
            }
        }
    }
}
