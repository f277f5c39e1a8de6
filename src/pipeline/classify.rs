//! Stage 2: latest-message, first-hit classification.
//!
//! Per entity the newest summary is selected and its normalized head is
//! searched for the earliest positive and the earliest negative phrase.
//! Whichever class hits first decides; no hit at all means human review.

use std::collections::BTreeMap;

use tracing::debug;

use crate::mail::types::MessageSummary;
use crate::pipeline::types::{Outcomes, Verdict};
use crate::text::normalize;

/// Earliest byte offset at which any of `phrases` occurs in `text`.
///
/// Both inputs are expected in normalized form. Empty phrases are ignored.
pub fn first_hit<S: AsRef<str>>(text: &str, phrases: &[S]) -> Option<usize> {
    phrases
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| !p.is_empty())
        .filter_map(|p| text.find(p))
        .min()
}

/// Decision rule over the two first-hit offsets.
///
/// Equal offsets resolve to [`Verdict::Decline`].
pub fn decide(positive: Option<usize>, negative: Option<usize>) -> Verdict {
    match (positive, negative) {
        (None, None) => Verdict::Review,
        (Some(_), None) => Verdict::Approve,
        (None, Some(_)) => Verdict::Decline,
        (Some(pos), Some(neg)) if pos < neg => Verdict::Approve,
        (Some(_), Some(_)) => Verdict::Decline,
    }
}

/// First-hit classifier over two normalized phrase pools.
pub struct Classifier {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Classifier {
    /// Phrases are normalized like message heads, longest first.
    pub fn new<S: AsRef<str>>(positive: &[S], negative: &[S]) -> Self {
        Self {
            positive: prepare(positive),
            negative: prepare(negative),
        }
    }

    /// Classify one already-normalized text.
    pub fn verdict(&self, normalized_text: &str) -> Verdict {
        decide(
            first_hit(normalized_text, &self.positive),
            first_hit(normalized_text, &self.negative),
        )
    }

    /// Pick each entity's newest summary and bucket it.
    ///
    /// Among equal timestamps the first summary in the entity's list wins,
    /// so replays of the same batch always produce the same outcome.
    pub fn classify_latest<'a>(
        &self,
        filtered: &BTreeMap<String, Vec<&'a MessageSummary>>,
    ) -> Outcomes<'a> {
        let mut outcomes = Outcomes::default();

        for (entity, summaries) in filtered {
            let Some(latest) = latest(summaries) else {
                continue;
            };
            let verdict = self.verdict(&normalize(&latest.head));
            debug!(entity = %entity, id = %latest.id, %verdict, "Classified latest message");
            outcomes.insert(verdict, entity.clone(), latest);
        }

        outcomes
    }
}

fn prepare<S: AsRef<str>>(phrases: &[S]) -> Vec<String> {
    let mut prepared: Vec<String> = phrases
        .iter()
        .map(|p| normalize(p.as_ref()))
        .filter(|p| !p.is_empty())
        .collect();
    prepared.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    prepared.dedup();
    prepared
}

/// Newest summary; ties keep the earliest in slice order.
fn latest<'a>(summaries: &[&'a MessageSummary]) -> Option<&'a MessageSummary> {
    summaries
        .iter()
        .copied()
        .reduce(|best, s| if s.timestamp > best.timestamp { s } else { best })
}
