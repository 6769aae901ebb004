//! Persistence and rule-evaluation core of the feed store.
//! This crate owns entity identity, ownership cascades, change events and
//! news filters.

pub mod codec;
pub mod config;
pub mod db;
pub mod event;
pub mod logging;
pub mod model;
pub mod prefs;
pub mod repo;
pub mod search;
pub mod service;
pub mod store;

pub use codec::location::{Location, LocationBuckets, LocationCodecError};
pub use config::{ConfigError, StoreOptions};
pub use db::{DbError, StartupMode};
pub use event::{
    ChangeKind, DispatchReport, EntityListener, EventBatch, FilterListener, ListenerId,
    ListenerResult,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{AnyEntity, Entity, EntityId, EntityKind, EntityRef};
pub use model::feed::Feed;
pub use model::filter::{FilterAction, SearchFilter};
pub use model::folder::{BookMark, Folder, FolderChild, NewsBin, SearchMark};
pub use model::label::Label;
pub use model::news::{Attachment, Category, News, NewsState, Person};
pub use model::search::{Search, SearchCondition, SearchField, SearchSpecifier, SearchValue};
pub use prefs::{PreferenceScope, RetentionOverrides, RetentionPolicy, ScopedPreferences};
pub use service::{FilterEngine, ReloadPipeline, RetentionService};
pub use store::{EntityStore, StoreError, StoreRead, StoreResult, UnitOfWork};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
