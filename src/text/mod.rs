//! Text canonicalization shared by every matching stage.

pub mod normalize;

pub use normalize::{LEGAL_SUFFIXES, normalize, normalize_entity_name};
