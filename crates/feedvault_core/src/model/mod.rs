//! Domain model of the feed store.
//!
//! # Responsibility
//! - Define entity types for the folder tree, feeds, news, labels, searches
//!   and filters.
//! - Define identity semantics shared by all entity types.
//!
//! # Invariants
//! - Every entity starts unsaved (`id() == None`); storage assigns ids.
//! - Exclusive ownership and shared-resource rules live in
//!   `store::ownership`, not in the model.

pub mod entity;
pub mod feed;
pub mod filter;
pub mod folder;
pub mod label;
pub mod news;
pub mod search;
