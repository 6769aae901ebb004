//! In-memory search evaluation.
//!
//! # Responsibility
//! - Match news against search conditions for filters and search marks.
//! - Resolve filter scopes against the folder tree.

pub mod matcher;

pub use matcher::{matches_condition, matches_search, LocationIndex, MatchContext};
