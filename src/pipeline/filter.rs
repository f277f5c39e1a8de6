//! Stage 1: relevance filter.
//!
//! Keeps summaries that mention a known entity, discarding noise first.
//! The head is searched before the body so that signatures and footers
//! naming other companies cannot steal a match.

use std::collections::BTreeMap;

use tracing::debug;

use crate::mail::types::MessageSummary;
use crate::pipeline::types::Entity;
use crate::text::normalize;

/// Default number of body characters searched when the head has no match.
pub const DEFAULT_BODY_WINDOW: usize = 6000;

pub struct RelevanceFilter {
    noise_markers: Vec<String>,
    body_window: usize,
}

impl RelevanceFilter {
    /// `noise_markers` are normalized here; blank markers are dropped.
    pub fn new<S: AsRef<str>>(noise_markers: &[S], body_window: usize) -> Self {
        let mut noise_markers: Vec<String> = noise_markers
            .iter()
            .map(|m| normalize(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        noise_markers.sort();
        noise_markers.dedup();
        Self {
            noise_markers,
            body_window,
        }
    }

    /// Whether the normalized `subject + head` contains a noise marker.
    pub fn is_noise(&self, summary: &MessageSummary) -> bool {
        let haystack = normalize(&format!("{} {}", summary.subject, summary.head));
        self.noise_markers.iter().any(|m| haystack.contains(m.as_str()))
    }

    /// Group summaries by the first entity they mention.
    ///
    /// Entities are tried in slice order and the first match wins, so a
    /// summary is attributed to at most one entity. Summary order within
    /// each group follows the input order.
    pub fn filter_by_entity<'a>(
        &self,
        summaries: &'a [MessageSummary],
        entities: &[Entity],
    ) -> BTreeMap<String, Vec<&'a MessageSummary>> {
        let candidates: Vec<&Entity> = entities
            .iter()
            .filter(|e| !e.normalized_name.is_empty())
            .collect();

        let mut matched: BTreeMap<String, Vec<&'a MessageSummary>> = BTreeMap::new();
        for summary in summaries {
            if self.is_noise(summary) {
                debug!(id = %summary.id, subject = %summary.subject, "Skipping noise message");
                continue;
            }

            if let Some(entity) = self.match_entity(summary, &candidates) {
                matched
                    .entry(entity.raw_name.clone())
                    .or_default()
                    .push(summary);
            }
        }
        matched
    }

    fn match_entity<'e>(&self, summary: &MessageSummary, entities: &[&'e Entity]) -> Option<&'e Entity> {
        let head = normalize(&summary.head);
        if let Some(entity) = first_mentioned(&head, entities) {
            return Some(entity);
        }

        let window: String = summary.full_text.chars().take(self.body_window).collect();
        if window.is_empty() {
            return None;
        }
        let body = normalize(&window);
        let found = first_mentioned(&body, entities);
        if let Some(entity) = found {
            debug!(id = %summary.id, entity = %entity.raw_name, "Entity found below the head");
        }
        found
    }
}

fn first_mentioned<'e>(text: &str, entities: &[&'e Entity]) -> Option<&'e Entity> {
    entities
        .iter()
        .copied()
        .find(|e| text.contains(e.normalized_name.as_str()))
}
