//! One full pipeline cycle.
//!
//! entities → collect → fetch → Stage 1 → Stage 2 → sink → advance
//!
//! The marker is advanced last, after the sink accepted the outcomes. Any
//! failure before that leaves it untouched, so the next cycle re-delivers
//! the same window.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::mail::collector::Collector;
use crate::mail::fetcher::Fetcher;
use crate::mail::source::MessageSource;
use crate::pipeline::classify::Classifier;
use crate::pipeline::filter::RelevanceFilter;
use crate::pipeline::types::{Entity, EntitySource, OutcomeSink};
use crate::store::traits::PointerStore;

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Pending entities considered.
    pub entities: usize,
    /// Ids returned by the collector.
    pub collected: usize,
    /// Summaries successfully fetched and extracted.
    pub fetched: usize,
    /// Entities with at least one relevant message.
    pub matched: usize,
    pub approved: usize,
    pub declined: usize,
    pub review: usize,
    /// Backlog remains; the next cycle continues draining it.
    pub has_more: bool,
    /// Marker value written at the end of the cycle, if any.
    pub advanced_to: Option<String>,
}

pub struct Pipeline {
    collector: Collector,
    fetcher: Fetcher,
    filter: RelevanceFilter,
    classifier: Classifier,
    entities: Arc<dyn EntitySource>,
    sink: Arc<dyn OutcomeSink>,
    pointer_key: String,
    batch_limit: usize,
    query: String,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        source: Arc<dyn MessageSource>,
        store: Arc<dyn PointerStore>,
        entities: Arc<dyn EntitySource>,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        let collector =
            Collector::new(Arc::clone(&source), store).with_bootstrap_policy(config.bootstrap);
        let fetcher = Fetcher::new(
            source,
            config.fetch_mode,
            config.head_max_chars,
            config.max_batch_size,
        );
        Self {
            collector,
            fetcher,
            filter: RelevanceFilter::new(&config.noise_markers, config.body_window),
            classifier: Classifier::new(&config.positive_phrases, &config.negative_phrases),
            entities,
            sink,
            pointer_key: config.pointer_key.clone(),
            batch_limit: config.batch_limit,
            query: config.query.clone(),
        }
    }

    pub fn pointer_key(&self) -> &str {
        &self.pointer_key
    }

    /// Run one cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        let entities: Vec<Entity> = self
            .entities
            .pending_entities()
            .await?
            .into_iter()
            .map(|pending| Entity::new(pending.name))
            .collect();

        let batch = self
            .collector
            .collect_once(&self.pointer_key, self.batch_limit, &self.query)
            .await?;

        let mut report = CycleReport {
            entities: entities.len(),
            collected: batch.ids.len(),
            has_more: batch.has_more,
            ..Default::default()
        };

        if batch.ids.is_empty() {
            info!(pointer_key = %self.pointer_key, "No new messages");
            return Ok(report);
        }

        let summaries = self.fetcher.fetch_summaries(&batch.ids).await;
        report.fetched = summaries.len();

        if summaries.is_empty() || entities.is_empty() {
            debug!(
                fetched = summaries.len(),
                entities = entities.len(),
                "Nothing to classify"
            );
            return self.finish(report, &batch.head_id).await;
        }

        let filtered = self.filter.filter_by_entity(&summaries, &entities);
        report.matched = filtered.len();
        if filtered.is_empty() {
            debug!(fetched = summaries.len(), "No message mentions a pending entity");
            return self.finish(report, &batch.head_id).await;
        }

        let outcomes = self.classifier.classify_latest(&filtered);
        report.approved = outcomes.approve.len();
        report.declined = outcomes.decline.len();
        report.review = outcomes.review.len();

        if !outcomes.is_empty() {
            self.sink.write_outcomes(&outcomes).await?;
        }

        self.finish(report, &batch.head_id).await
    }

    async fn finish(
        &self,
        mut report: CycleReport,
        head_id: &str,
    ) -> Result<CycleReport, PipelineError> {
        self.collector.advance(&self.pointer_key, head_id).await?;
        if !head_id.is_empty() {
            report.advanced_to = Some(head_id.to_string());
        }

        info!(
            pointer_key = %self.pointer_key,
            collected = report.collected,
            fetched = report.fetched,
            matched = report.matched,
            approved = report.approved,
            declined = report.declined,
            review = report.review,
            has_more = report.has_more,
            "Cycle complete"
        );
        Ok(report)
    }
}
