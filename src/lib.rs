//! Mail Verdict: incremental mailbox collection and company-reply classification.

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod mail;
pub mod pipeline;
pub mod ratelimit;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod text;
