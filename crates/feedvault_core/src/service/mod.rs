//! Core use-case services.
//!
//! # Responsibility
//! - Run filters over reloaded news and apply retention afterwards.
//! - Keep storage details behind the entity store.

pub mod filter_actions;
pub mod filter_service;
pub mod reload_service;
pub mod retention_service;

pub use filter_actions::{ActionRegistry, MatchedNews, NewsAction};
pub use filter_service::{AppliedFilter, FilterEngine, FilterRunReport};
pub use reload_service::{ReloadError, ReloadOutcome, ReloadPipeline};
pub use retention_service::{RetentionReport, RetentionService};
