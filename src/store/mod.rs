//! Persistence layer: marker stores and the entity tracker.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::{EntityRecord, LibSqlBackend};
pub use memory::InMemoryPointerStore;
pub use traits::PointerStore;
