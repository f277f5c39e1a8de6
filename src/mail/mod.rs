//! Mailbox access: remote source, incremental collection, body extraction.

pub mod collector;
pub mod extract;
pub mod fetcher;
pub mod gmail;
pub mod resilient;
pub mod source;
pub mod types;

pub use collector::{BootstrapPolicy, CollectedBatch, Collector};
pub use fetcher::{FetchMode, Fetcher};
pub use gmail::GmailSource;
pub use resilient::ResilientSource;
pub use source::MessageSource;
pub use types::{MessageSummary, RawMessage};
