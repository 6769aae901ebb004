//! Reconciliation of a detached entity onto its persisted snapshot.
//!
//! # Responsibility
//! - Pair nested elements of the incoming entity with persisted ones.
//! - Carry persisted ids over to paired elements so they update in place.
//! - Report persisted elements that have no incoming counterpart.
//!
//! # Invariants
//! - Pairing order: id, then natural key, then position among the
//!   elements that have no natural key.
//! - Incoming elements sharing one natural key collapse to the first one.
//! - Merging never fails and never mutates the incoming entity.

use crate::model::entity::{AnyEntity, Entity, EntityId};
use crate::model::feed::Feed;
use crate::model::filter::{FilterAction, SearchFilter};
use crate::model::folder::{BookMark, Folder, NewsBin, SearchMark};
use crate::model::label::Label;
use crate::model::news::{Attachment, Category, News, Person};
use crate::model::search::{Search, SearchCondition};
use std::collections::BTreeSet;

/// Reconciled entity plus persisted nested elements that must go.
#[derive(Debug, Clone)]
pub struct Merged<T> {
    pub value: T,
    /// Snapshots of removed nested elements, owned rows first.
    pub removed: Vec<AnyEntity>,
}

impl<T> Merged<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            removed: Vec::new(),
        }
    }
}

/// Merge of a persisted snapshot with an incoming, possibly divergent copy.
pub trait Merge: Sized {
    fn merge(persisted: &Self, incoming: &Self) -> Merged<Self>;

    /// Normalizes a copy about to be inserted, as if merged onto an empty
    /// snapshot.
    fn fresh(incoming: &Self) -> Self;
}

/// Nested element that can be paired across two lists.
pub trait Reconcile: Entity {
    fn set_id(&mut self, id: Option<EntityId>);

    /// Stable pairing key. `None` falls back to positional pairing.
    fn natural_key(&self) -> Option<String> {
        None
    }
}

macro_rules! scalar_merge {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Merge for $ty {
                fn merge(persisted: &Self, incoming: &Self) -> Merged<Self> {
                    let mut value = incoming.clone();
                    value.id = persisted.id;
                    Merged::new(value)
                }

                fn fresh(incoming: &Self) -> Self {
                    incoming.clone()
                }
            }
        )+
    };
}

scalar_merge!(Folder, BookMark, NewsBin, Feed, Label);

impl Merge for News {
    fn merge(persisted: &Self, incoming: &Self) -> Merged<Self> {
        let mut removed = Vec::new();
        let mut value = incoming.clone();
        value.id = persisted.id;
        value.categories =
            reconcile_list(&persisted.categories, &incoming.categories, &mut removed);
        value.attachments =
            reconcile_list(&persisted.attachments, &incoming.attachments, &mut removed);
        value.author = reconcile_slot(&persisted.author, &incoming.author, &mut removed);
        value.labels = merge_labels(&incoming.labels);
        Merged { value, removed }
    }

    fn fresh(incoming: &Self) -> Self {
        let mut removed = Vec::new();
        let mut value = incoming.clone();
        value.categories = reconcile_list(&[], &incoming.categories, &mut removed);
        value.attachments = reconcile_list(&[], &incoming.attachments, &mut removed);
        value.author = reconcile_slot(&None, &incoming.author, &mut removed);
        value.labels = merge_labels(&incoming.labels);
        value
    }
}

impl Merge for SearchMark {
    fn merge(persisted: &Self, incoming: &Self) -> Merged<Self> {
        let mut removed = Vec::new();
        let mut value = incoming.clone();
        value.id = persisted.id;
        value.conditions =
            reconcile_list(&persisted.conditions, &incoming.conditions, &mut removed);
        Merged { value, removed }
    }

    fn fresh(incoming: &Self) -> Self {
        let mut value = incoming.clone();
        value.conditions = reconcile_list(&[], &incoming.conditions, &mut Vec::new());
        value
    }
}

impl Merge for SearchFilter {
    fn merge(persisted: &Self, incoming: &Self) -> Merged<Self> {
        let mut removed = Vec::new();
        let mut value = incoming.clone();
        value.id = persisted.id;
        value.search = match (&persisted.search, &incoming.search) {
            (Some(old), Some(new)) => {
                let mut search = new.clone();
                search.id = old.id;
                search.conditions =
                    reconcile_list(&old.conditions, &new.conditions, &mut removed);
                Some(search)
            }
            (Some(old), None) => {
                removed.extend(old.conditions.iter().cloned().map(AnyEntity::from));
                removed.push(old.clone().into());
                None
            }
            (None, Some(new)) => {
                let mut search = new.clone();
                search.id = None;
                search.conditions = reconcile_list(&[], &new.conditions, &mut removed);
                Some(search)
            }
            (None, None) => None,
        };
        value.actions = reconcile_list(&persisted.actions, &incoming.actions, &mut removed);
        Merged { value, removed }
    }

    fn fresh(incoming: &Self) -> Self {
        let mut removed = Vec::new();
        let mut value = incoming.clone();
        value.search = incoming.search.as_ref().map(|search| {
            let mut search = search.clone();
            search.id = None;
            search.conditions = reconcile_list(&[], &search.conditions, &mut removed);
            search
        });
        value.actions = reconcile_list(&[], &incoming.actions, &mut removed);
        value
    }
}

/// Reconciles one nested list, pushing unpaired persisted elements into
/// `removed`.
pub fn reconcile_list<T: Reconcile>(
    persisted: &[T],
    incoming: &[T],
    removed: &mut Vec<AnyEntity>,
) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(incoming.len());
    let mut seen_keys = BTreeSet::new();
    for item in incoming {
        if let Some(key) = item.natural_key() {
            if !seen_keys.insert(key) {
                continue;
            }
        }
        out.push(item.clone());
    }

    let mut claimed = vec![false; persisted.len()];
    let mut paired = vec![false; out.len()];

    for (index, item) in out.iter_mut().enumerate() {
        let Some(id) = item.id() else {
            continue;
        };
        let position = persisted
            .iter()
            .enumerate()
            .position(|(slot, old)| !claimed[slot] && old.id() == Some(id));
        match position {
            Some(slot) => {
                claimed[slot] = true;
                paired[index] = true;
            }
            None => item.set_id(None),
        }
    }

    for (index, item) in out.iter_mut().enumerate() {
        if paired[index] {
            continue;
        }
        let Some(key) = item.natural_key() else {
            continue;
        };
        let position = persisted
            .iter()
            .enumerate()
            .position(|(slot, old)| !claimed[slot] && old.natural_key().as_ref() == Some(&key));
        if let Some(slot) = position {
            claimed[slot] = true;
            paired[index] = true;
            item.set_id(persisted[slot].id());
        }
    }

    let mut keyless = persisted
        .iter()
        .enumerate()
        .filter(|(_, old)| old.natural_key().is_none())
        .map(|(slot, _)| slot)
        .collect::<Vec<_>>()
        .into_iter();
    for (index, item) in out.iter_mut().enumerate() {
        if paired[index] || item.natural_key().is_some() {
            continue;
        }
        let next = keyless.by_ref().find(|slot| !claimed[*slot]);
        if let Some(slot) = next {
            claimed[slot] = true;
            paired[index] = true;
            item.set_id(persisted[slot].id());
        }
    }

    for (slot, old) in persisted.iter().enumerate() {
        if !claimed[slot] {
            removed.push(old.clone().into());
        }
    }
    out
}

/// Reconciles a single optional element; any two values pair.
pub fn reconcile_slot<T: Reconcile>(
    persisted: &Option<T>,
    incoming: &Option<T>,
    removed: &mut Vec<AnyEntity>,
) -> Option<T> {
    match (persisted, incoming) {
        (Some(old), Some(new)) => {
            let mut value = new.clone();
            value.set_id(old.id());
            Some(value)
        }
        (Some(old), None) => {
            removed.push(old.clone().into());
            None
        }
        (None, Some(new)) => {
            let mut value = new.clone();
            value.set_id(None);
            Some(value)
        }
        (None, None) => None,
    }
}

/// Saved labels of `incoming`, deduplicated by id.
fn merge_labels(incoming: &[Label]) -> Vec<Label> {
    let mut seen = BTreeSet::new();
    incoming
        .iter()
        .filter(|label| label.id.is_some_and(|id| seen.insert(id)))
        .cloned()
        .collect()
}

fn lowercase(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_lowercase()
}

impl Reconcile for Category {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn natural_key(&self) -> Option<String> {
        if self.name.is_none() && self.domain.is_none() {
            return None;
        }
        Some(format!("{}\u{1f}{}", lowercase(&self.name), lowercase(&self.domain)))
    }
}

impl Reconcile for Person {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn natural_key(&self) -> Option<String> {
        let email = lowercase(&self.email);
        if !email.is_empty() {
            return Some(email);
        }
        let name = lowercase(&self.name);
        (!name.is_empty()).then_some(name)
    }
}

impl Reconcile for Attachment {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    fn natural_key(&self) -> Option<String> {
        (!self.link.is_empty()).then(|| self.link.clone())
    }
}

impl Reconcile for SearchCondition {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

impl Reconcile for FilterAction {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}

impl Reconcile for Search {
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
}
