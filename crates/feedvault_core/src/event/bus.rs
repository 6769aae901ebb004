//! Listener registry and post-commit dispatch.
//!
//! # Responsibility
//! - Keep per-kind entity listeners and filter listeners, owned by one store.
//! - Deliver each (kind, change) group with a single callback per listener.
//! - Isolate listener failures and report them.
//!
//! # Invariants
//! - Dispatch runs only after the unit of work committed.
//! - A failing or panicking listener never stops delivery to the others.

use crate::event::change::{ChangeKind, EventBatch};
use crate::model::entity::{AnyEntity, EntityKind};
use crate::model::filter::SearchFilter;
use crate::model::news::News;
use crate::store::EntityStore;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type ListenerError = Box<dyn Error + Send + Sync>;
pub type ListenerResult = Result<(), ListenerError>;

/// Receives coalesced notices for one entity kind.
///
/// Callbacks get read access to the store the batch was committed to.
pub trait EntityListener: Send + Sync {
    fn on_added(&self, store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        let _ = (store, entities);
        Ok(())
    }

    fn on_updated(&self, store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        let _ = (store, entities);
        Ok(())
    }

    fn on_deleted(&self, store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        let _ = (store, entities);
        Ok(())
    }
}

/// Receives one notice per filter that matched news in a filter run.
pub trait FilterListener: Send + Sync {
    fn on_filter_applied(
        &self,
        store: &EntityStore,
        filter: &SearchFilter,
        news: &[News],
    ) -> ListenerResult;
}

/// Registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// Callback that failed during dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedCallback {
    Entity {
        kind: EntityKind,
        change: ChangeKind,
    },
    FilterApplied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: ListenerId,
    pub callback: FailedCallback,
    pub message: String,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks that returned `Ok`.
    pub delivered: usize,
    pub failures: Vec<ListenerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Event bus owned by one store.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    entity_listeners: BTreeMap<EntityKind, Vec<(ListenerId, Arc<dyn EntityListener>)>>,
    filter_listeners: Vec<(ListenerId, Arc<dyn FilterListener>)>,
}

impl EventBus {
    pub fn add_listener(&mut self, kind: EntityKind, listener: Arc<dyn EntityListener>) -> ListenerId {
        let id = self.allocate_id();
        self.entity_listeners
            .entry(kind)
            .or_default()
            .push((id, listener));
        debug!(
            "event=listener_add module=event status=ok kind={} listener={}",
            kind, id.0
        );
        id
    }

    /// Returns `false` when no listener with `id` was registered for `kind`.
    pub fn remove_listener(&mut self, kind: EntityKind, id: ListenerId) -> bool {
        let Some(listeners) = self.entity_listeners.get_mut(&kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.entity_listeners.remove(&kind);
        }
        removed
    }

    pub fn add_filter_listener(&mut self, listener: Arc<dyn FilterListener>) -> ListenerId {
        let id = self.allocate_id();
        self.filter_listeners.push((id, listener));
        id
    }

    pub fn remove_filter_listener(&mut self, id: ListenerId) -> bool {
        let before = self.filter_listeners.len();
        self.filter_listeners
            .retain(|(listener_id, _)| *listener_id != id);
        self.filter_listeners.len() != before
    }

    pub fn listener_count(&self, kind: EntityKind) -> usize {
        self.entity_listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Delivers `batch` to every registered listener.
    pub fn dispatch(&self, batch: &EventBatch, store: &EntityStore) -> DispatchReport {
        let mut report = DispatchReport::default();
        if batch.is_empty() {
            return report;
        }

        for (kind, listeners) in &self.entity_listeners {
            let Some(group) = batch.group(*kind) else {
                continue;
            };
            for change in ChangeKind::ALL {
                let entities = group.get(change);
                if entities.is_empty() {
                    continue;
                }
                for (id, listener) in listeners {
                    let outcome = invoke(|| match change {
                        ChangeKind::Added => listener.on_added(store, entities),
                        ChangeKind::Updated => listener.on_updated(store, entities),
                        ChangeKind::Removed => listener.on_deleted(store, entities),
                    });
                    record(
                        &mut report,
                        *id,
                        FailedCallback::Entity {
                            kind: *kind,
                            change,
                        },
                        outcome,
                    );
                }
            }
        }

        for applied in batch.filters_applied() {
            for (id, listener) in &self.filter_listeners {
                let outcome =
                    invoke(|| listener.on_filter_applied(store, &applied.filter, &applied.news));
                record(&mut report, *id, FailedCallback::FilterApplied, outcome);
            }
        }

        debug!(
            "event=event_dispatch module=event status=ok notices={} delivered={} failures={}",
            batch.len(),
            report.delivered,
            report.failures.len()
        );
        report
    }

    fn allocate_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }
}

fn invoke(callback: impl FnOnce() -> ListenerResult) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn record(
    report: &mut DispatchReport,
    listener: ListenerId,
    callback: FailedCallback,
    outcome: Result<(), String>,
) {
    match outcome {
        Ok(()) => report.delivered += 1,
        Err(message) => {
            warn!(
                "event=listener_failed module=event status=error listener={} callback={:?} error={}",
                listener.0, callback, message
            );
            report.failures.push(ListenerFailure {
                listener,
                callback,
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("listener panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("listener panicked: {message}")
    } else {
        "listener panicked".to_string()
    }
}
