//! Shared types for the classification pipeline.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PipelineError;
use crate::mail::types::MessageSummary;
use crate::text::normalize_entity_name;

// ── Entities ────────────────────────────────────────────────────────

/// A tracked external party (company), with its matching key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub raw_name: String,
    /// Derived once from `raw_name`; empty when the name is all punctuation
    /// or suffixes, in which case the entity never matches.
    pub normalized_name: String,
}

impl Entity {
    pub fn new(raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        let normalized_name = normalize_entity_name(&raw_name);
        Self {
            raw_name,
            normalized_name,
        }
    }
}

/// An entity row still awaiting a decision, as read from the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntity {
    pub row: i64,
    pub name: String,
}

// ── Verdicts ────────────────────────────────────────────────────────

/// Outcome bucket for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Decline,
    Review,
}

impl Verdict {
    /// Status text written to the tracker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approved",
            Self::Decline => "Declined",
            Self::Review => "Needs review",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Decline => "decline",
            Self::Review => "review",
        })
    }
}

/// The three outcome buckets of one run, keyed by raw entity name.
///
/// Each entity maps to the single summary chosen as its current decision
/// message, borrowed from the run's summary batch.
#[derive(Debug, Default)]
pub struct Outcomes<'a> {
    pub approve: BTreeMap<String, &'a MessageSummary>,
    pub decline: BTreeMap<String, &'a MessageSummary>,
    pub review: BTreeMap<String, &'a MessageSummary>,
}

impl<'a> Outcomes<'a> {
    pub fn insert(&mut self, verdict: Verdict, entity: String, summary: &'a MessageSummary) {
        self.bucket_mut(verdict).insert(entity, summary);
    }

    pub fn bucket(&self, verdict: Verdict) -> &BTreeMap<String, &'a MessageSummary> {
        match verdict {
            Verdict::Approve => &self.approve,
            Verdict::Decline => &self.decline,
            Verdict::Review => &self.review,
        }
    }

    fn bucket_mut(&mut self, verdict: Verdict) -> &mut BTreeMap<String, &'a MessageSummary> {
        match verdict {
            Verdict::Approve => &mut self.approve,
            Verdict::Decline => &mut self.decline,
            Verdict::Review => &mut self.review,
        }
    }

    /// Verdict recorded for `entity`, if any.
    pub fn verdict_for(&self, entity: &str) -> Option<Verdict> {
        [Verdict::Approve, Verdict::Decline, Verdict::Review]
            .into_iter()
            .find(|v| self.bucket(*v).contains_key(entity))
    }

    pub fn len(&self) -> usize {
        self.approve.len() + self.decline.len() + self.review.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Collaborators ───────────────────────────────────────────────────

/// Source of truth for entities still awaiting a decision.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Pending entities in a stable order; the order is the Stage-1 tie-break.
    async fn pending_entities(&self) -> Result<Vec<PendingEntity>, PipelineError>;
}

/// Receiver of a run's outcomes.
///
/// Implementations apply their own idempotence: a re-delivered batch must
/// not overwrite decisions that are already recorded.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn write_outcomes(&self, outcomes: &Outcomes<'_>) -> Result<(), PipelineError>;
}
