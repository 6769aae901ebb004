//! Change notifications produced by units of work.
//!
//! Notices are collected in a [`change::ChangeSet`] while a unit of work
//! runs, coalesced into an [`change::EventBatch`] at commit, and delivered
//! by the store-owned [`bus::EventBus`].

pub mod bus;
pub mod change;

pub use bus::{
    DispatchReport, EntityListener, EventBus, FailedCallback, FilterListener, ListenerError,
    ListenerFailure, ListenerId, ListenerResult,
};
pub use change::{ChangeKind, ChangeSet, EventBatch, FilterApplied, KindGroup};
