//! Two-stage classification pipeline.
//!
//! 1. `RelevanceFilter` keeps summaries that mention a pending entity,
//!    dropping noise (digests, aggregators, OTP notices) first.
//! 2. `Classifier`: per entity, take the newest summary and bucket it by
//!    the earliest positive or negative phrase in its head.
//!
//! `Pipeline` wires both stages between the collector and the outcome sink.

pub mod classify;
pub mod filter;
pub mod patterns;
pub mod runner;
pub mod types;

pub use classify::{Classifier, decide, first_hit};
pub use filter::RelevanceFilter;
pub use runner::{CycleReport, Pipeline};
pub use types::{Entity, EntitySource, OutcomeSink, Outcomes, PendingEntity, Verdict};
