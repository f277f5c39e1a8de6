//! Incremental collector: marker-bounded pagination.
//!
//! Each pass lists the mailbox newest-first and stops at whichever comes
//! first: `limit` ids, the stored marker (excluded), or the end of the
//! listing. The marker only moves through [`Collector::advance`], or once at
//! bootstrap under [`BootstrapPolicy::AdvanceImmediately`].
//!
//! The marker store is assumed to have one writer per key; two collectors
//! sharing a key can interleave their writes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{CollectError, ConfigError};
use crate::mail::source::MessageSource;
use crate::store::traits::PointerStore;

/// Largest page the listing API accepts.
pub const MAX_PAGE_SIZE: usize = 500;

/// When the marker is written on a stream's first run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BootstrapPolicy {
    /// Persist the newest id as soon as it is seen. A crash before the first
    /// batch is processed skips that batch for good.
    #[default]
    AdvanceImmediately,
    /// Leave the marker unset until the consumer calls `advance`. A crash
    /// re-delivers the first batch instead.
    DeferUntilProcessed,
}

impl FromStr for BootstrapPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advance_immediately" => Ok(Self::AdvanceImmediately),
            "defer_until_processed" => Ok(Self::DeferUntilProcessed),
            other => Err(ConfigError::InvalidValue {
                key: "BOOTSTRAP_POLICY".into(),
                message: format!(
                    "expected advance_immediately or defer_until_processed, got {other:?}"
                ),
            }),
        }
    }
}

impl fmt::Display for BootstrapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AdvanceImmediately => "advance_immediately",
            Self::DeferUntilProcessed => "defer_until_processed",
        })
    }
}

/// Result of one collection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedBatch {
    /// New message ids, newest first. Never contains the marker.
    pub ids: Vec<String>,
    /// Value to pass to `advance` once the batch is processed. Empty only
    /// for an empty mailbox without a marker.
    pub head_id: String,
    /// More unseen messages remain beyond `limit`.
    pub has_more: bool,
}

/// Why listing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Limit,
    Marker,
    Exhausted,
}

pub struct Collector {
    source: Arc<dyn MessageSource>,
    store: Arc<dyn PointerStore>,
    bootstrap: BootstrapPolicy,
}

impl Collector {
    pub fn new(source: Arc<dyn MessageSource>, store: Arc<dyn PointerStore>) -> Self {
        Self {
            source,
            store,
            bootstrap: BootstrapPolicy::default(),
        }
    }

    pub fn with_bootstrap_policy(mut self, policy: BootstrapPolicy) -> Self {
        self.bootstrap = policy;
        self
    }

    pub fn bootstrap_policy(&self) -> BootstrapPolicy {
        self.bootstrap
    }

    /// Collect the ids that arrived since the stored marker.
    ///
    /// Listing failures (after the source's own retries) and store failures
    /// abort the pass; the marker is left untouched in both cases. A zero
    /// `limit` lists nothing and hands back the stored marker as the head.
    pub async fn collect_once(
        &self,
        pointer_key: &str,
        limit: usize,
        query: &str,
    ) -> Result<CollectedBatch, CollectError> {
        let marker = self.store.get(pointer_key).await?;

        if limit == 0 {
            warn!(pointer_key, "Collection limit is zero; nothing collected");
            return Ok(CollectedBatch {
                ids: Vec::new(),
                head_id: marker.unwrap_or_default(),
                has_more: false,
            });
        }

        let (ids, stop) = self.list_until_marker(query, limit, marker.as_deref()).await?;

        let has_more = marker.is_some() && stop == StopReason::Limit;

        let head_id = match ids.first() {
            Some(newest) => newest.clone(),
            None => self.peek_head(query, marker.as_deref()).await?,
        };

        if marker.is_none()
            && !ids.is_empty()
            && self.bootstrap == BootstrapPolicy::AdvanceImmediately
        {
            self.store.set(pointer_key, &head_id).await?;
            info!(
                pointer_key,
                head_id = %head_id,
                "Bootstrapped marker to newest message"
            );
        }

        info!(
            pointer_key,
            source = self.source.name(),
            count = ids.len(),
            head_id = %head_id,
            has_more,
            stop = ?stop,
            "Collection pass complete"
        );

        Ok(CollectedBatch {
            ids,
            head_id,
            has_more,
        })
    }

    /// Move the marker to `head_id` after its batch is fully processed.
    ///
    /// An empty `head_id` is ignored with a warning, so an empty mailbox can
    /// never rewind the marker.
    pub async fn advance(&self, pointer_key: &str, head_id: &str) -> Result<(), CollectError> {
        if head_id.is_empty() {
            warn!(pointer_key, "Refusing to advance marker to an empty id");
            return Ok(());
        }
        self.store.set(pointer_key, head_id).await?;
        debug!(pointer_key, head_id, "Marker advanced");
        Ok(())
    }

    async fn list_until_marker(
        &self,
        query: &str,
        limit: usize,
        marker: Option<&str>,
    ) -> Result<(Vec<String>, StopReason), CollectError> {
        let mut ids: Vec<String> = Vec::with_capacity(limit.min(MAX_PAGE_SIZE));
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let page_size = (limit - ids.len()).min(MAX_PAGE_SIZE);
            let page = self
                .source
                .list_page(query, page_size, page_token.as_deref())
                .await?;

            for message in page.messages {
                if marker == Some(message.id.as_str()) {
                    return Ok((ids, StopReason::Marker));
                }
                ids.push(message.id);
                if ids.len() >= limit {
                    return Ok((ids, StopReason::Limit));
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok((ids, StopReason::Exhausted)),
            }
        }

        Ok((ids, StopReason::Limit))
    }

    /// Newest id in the mailbox, falling back to the existing marker (or an
    /// empty string) when the mailbox is empty.
    async fn peek_head(&self, query: &str, marker: Option<&str>) -> Result<String, CollectError> {
        let page = self.source.list_page(query, 1, None).await?;
        Ok(match page.messages.into_iter().next() {
            Some(newest) => newest.id,
            None => marker.unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{SourceError, StoreError};
    use crate::mail::types::{ListPage, MessageRef, RawMessage};
    use crate::store::memory::InMemoryPointerStore;

    /// Serves a fixed newest-first id list, paginated by `page_size`.
    struct ScriptedSource {
        ids: Vec<String>,
        fail_listing: bool,
        requested_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedSource {
        fn new(ids: &[&str]) -> Self {
            Self {
                ids: ids.iter().map(|s| s.to_string()).collect(),
                fail_listing: false,
                requested_sizes: Mutex::new(Vec::new()),
            }
        }

        fn numbered(count: usize) -> Self {
            let ids: Vec<String> = (1..=count).rev().map(|n| format!("m{n}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            Self::new(&refs)
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn list_page(
            &self,
            _query: &str,
            page_size: usize,
            page_token: Option<&str>,
        ) -> Result<ListPage, SourceError> {
            if self.fail_listing {
                return Err(SourceError::Unavailable { status: 503 });
            }
            self.requested_sizes.lock().unwrap().push(page_size);
            let start: usize = page_token.map_or(0, |t| t.parse().unwrap());
            let end = (start + page_size).min(self.ids.len());
            Ok(ListPage {
                messages: self.ids[start..end].iter().map(MessageRef::new).collect(),
                next_page_token: (end < self.ids.len()).then(|| end.to_string()),
            })
        }

        async fn fetch_message(&self, id: &str) -> Result<RawMessage, SourceError> {
            Err(SourceError::NotFound(id.to_string()))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl PointerStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Connection("unreachable".into()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Connection("unreachable".into()))
        }
    }

    const KEY: &str = "gmail:last_processed_id";

    fn collector(source: ScriptedSource, store: Arc<InMemoryPointerStore>) -> Collector {
        Collector::new(Arc::new(source), store)
    }

    fn ids(batch: &CollectedBatch) -> Vec<&str> {
        batch.ids.iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn bootstrap_returns_newest_and_persists_marker() {
        let store = Arc::new(InMemoryPointerStore::new());
        let collector = collector(ScriptedSource::new(&["m3", "m2", "m1"]), store.clone());

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(ids(&batch), vec!["m3", "m2", "m1"]);
        assert_eq!(batch.head_id, "m3");
        assert!(!batch.has_more);
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m3"));
    }

    #[tokio::test]
    async fn deferred_bootstrap_leaves_marker_unset() {
        let store = Arc::new(InMemoryPointerStore::new());
        let collector = collector(ScriptedSource::new(&["m3", "m2", "m1"]), store.clone())
            .with_bootstrap_policy(BootstrapPolicy::DeferUntilProcessed);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(batch.head_id, "m3");
        assert_eq!(store.get(KEY).await.unwrap(), None);

        collector.advance(KEY, &batch.head_id).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m3"));
    }

    #[tokio::test]
    async fn steady_state_stops_at_marker_exclusively() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m2"));
        let collector = collector(ScriptedSource::new(&["m4", "m3", "m2", "m1"]), store.clone());

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(ids(&batch), vec!["m4", "m3"]);
        assert_eq!(batch.head_id, "m4");
        assert!(!batch.has_more);
        // not advanced until the consumer says so
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn backlog_reports_has_more() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m1"));
        let collector = collector(ScriptedSource::numbered(51), store);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(batch.ids.len(), 10);
        assert_eq!(batch.head_id, "m51");
        assert!(batch.has_more);
        assert!(!batch.ids.contains(&"m1".to_string()));
    }

    #[tokio::test]
    async fn marker_just_past_limit_is_still_has_more() {
        // exactly `limit` new messages: listing stops on the limit first
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m1"));
        let collector = collector(ScriptedSource::numbered(11), store);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(batch.ids.len(), 10);
        assert!(batch.has_more);
    }

    #[tokio::test]
    async fn bootstrap_never_reports_has_more() {
        let store = Arc::new(InMemoryPointerStore::new());
        let collector = collector(ScriptedSource::numbered(50), store);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(batch.ids.len(), 10);
        assert!(!batch.has_more);
    }

    #[tokio::test]
    async fn pages_are_concatenated_in_order() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m1"));
        let source = ScriptedSource::numbered(1200);
        let collector = collector(source, store);

        let batch = collector.collect_once(KEY, 1100, "").await.unwrap();
        assert_eq!(batch.ids.len(), 1100);
        assert_eq!(batch.ids[0], "m1200");
        assert_eq!(batch.ids[1099], "m101");
    }

    #[tokio::test]
    async fn page_size_shrinks_to_remaining_budget() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m1"));
        let source = Arc::new(ScriptedSource::numbered(700));
        let collector = Collector::new(source.clone(), store);

        collector.collect_once(KEY, 600, "").await.unwrap();
        assert_eq!(*source.requested_sizes.lock().unwrap(), vec![500, 100]);
    }

    #[tokio::test]
    async fn marker_absent_from_stream_exhausts_listing() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "gone"));
        let collector = collector(ScriptedSource::new(&["m2", "m1"]), store);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(ids(&batch), vec!["m2", "m1"]);
        assert!(!batch.has_more);
    }

    #[tokio::test]
    async fn no_new_messages_peeks_newest_head() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m3"));
        let collector = collector(ScriptedSource::new(&["m3", "m2"]), store);

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert!(batch.ids.is_empty());
        assert_eq!(batch.head_id, "m3");
        assert!(!batch.has_more);
    }

    #[tokio::test]
    async fn empty_mailbox_keeps_existing_marker() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m9"));
        let collector = collector(ScriptedSource::new(&[]), store.clone());

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert!(batch.ids.is_empty());
        assert_eq!(batch.head_id, "m9");

        collector.advance(KEY, &batch.head_id).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m9"));
    }

    #[tokio::test]
    async fn empty_mailbox_without_marker_has_empty_head() {
        let store = Arc::new(InMemoryPointerStore::new());
        let collector = collector(ScriptedSource::new(&[]), store.clone());

        let batch = collector.collect_once(KEY, 10, "").await.unwrap();
        assert_eq!(batch.head_id, "");
        assert_eq!(store.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn advance_with_empty_id_is_a_no_op() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m5"));
        let collector = collector(ScriptedSource::new(&[]), store.clone());

        collector.advance(KEY, "").await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m5"));
        collector.advance(KEY, "m6").await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m6"));
    }

    #[tokio::test]
    async fn zero_limit_returns_marker_as_head() {
        let store = Arc::new(InMemoryPointerStore::with_marker(KEY, "m2"));
        let collector = collector(ScriptedSource::new(&["m4", "m3", "m2", "m1"]), store.clone());

        let batch = collector.collect_once(KEY, 0, "").await.unwrap();
        assert!(batch.ids.is_empty());
        assert_eq!(batch.head_id, "m2");
        assert!(!batch.has_more);

        collector.advance(KEY, &batch.head_id).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().as_deref(), Some("m2"));
    }

    #[tokio::test]
    async fn zero_limit_without_marker_does_not_bootstrap() {
        let store = Arc::new(InMemoryPointerStore::new());
        let collector = collector(ScriptedSource::new(&["m2", "m1"]), store.clone());

        let batch = collector.collect_once(KEY, 0, "").await.unwrap();
        assert_eq!(batch.head_id, "");
        assert!(!batch.has_more);
        assert_eq!(store.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_failure_leaves_marker_untouched() {
        let store = Arc::new(InMemoryPointerStore::new());
        let mut source = ScriptedSource::new(&["m1"]);
        source.fail_listing = true;
        let collector = collector(source, store.clone());

        let err = collector.collect_once(KEY, 10, "").await.unwrap_err();
        assert!(matches!(err, CollectError::Listing(_)));
        assert_eq!(store.get(KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn store_failure_is_not_treated_as_absent_marker() {
        let collector = Collector::new(
            Arc::new(ScriptedSource::new(&["m1"])),
            Arc::new(BrokenStore),
        );
        let err = collector.collect_once(KEY, 10, "").await.unwrap_err();
        assert!(matches!(err, CollectError::Store(_)));
    }

    #[test]
    fn bootstrap_policy_parses() {
        assert_eq!(
            "defer_until_processed".parse::<BootstrapPolicy>().unwrap(),
            BootstrapPolicy::DeferUntilProcessed
        );
        assert_eq!(
            " Advance_Immediately ".parse::<BootstrapPolicy>().unwrap(),
            BootstrapPolicy::AdvanceImmediately
        );
        assert!("sometimes".parse::<BootstrapPolicy>().is_err());
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        fn run<T>(fut: impl std::future::Future<Output = T>) -> T {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(fut)
        }

        proptest! {
            #[test]
            fn batch_respects_limit_and_excludes_marker(
                stream_len in 0usize..60,
                marker_pick in proptest::option::of(any::<prop::sample::Index>()),
                limit in 1usize..30,
            ) {
                let stream: Vec<String> = (1..=stream_len).rev().map(|n| format!("m{n}")).collect();
                let refs: Vec<&str> = stream.iter().map(String::as_str).collect();
                let marker_pos = marker_pick
                    .filter(|_| stream_len > 0)
                    .map(|pick| pick.index(stream_len));

                let store = Arc::new(match marker_pos {
                    Some(pos) => InMemoryPointerStore::with_marker(KEY, &stream[pos]),
                    None => InMemoryPointerStore::new(),
                });
                let collector = collector(ScriptedSource::new(&refs), store);
                let batch = run(collector.collect_once(KEY, limit, "")).unwrap();

                prop_assert!(batch.ids.len() <= limit);
                let newer = marker_pos.unwrap_or(stream_len);
                prop_assert_eq!(&batch.ids[..], &stream[..newer.min(limit)]);
                if let Some(pos) = marker_pos {
                    prop_assert!(!batch.ids.contains(&stream[pos]));
                    prop_assert_eq!(batch.has_more, pos >= limit);
                } else {
                    prop_assert!(!batch.has_more);
                }
            }
        }
    }
}
