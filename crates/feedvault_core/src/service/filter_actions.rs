//! Filter action handlers.
//!
//! # Responsibility
//! - Map filter `action_id`s to handlers.
//! - Apply built-in actions to the news matched by one filter.
//!
//! # Invariants
//! - Handlers only touch matched items and report every item they change.
//! - Copy and move never target bins that fail to resolve; when none
//!   resolves the action is a no-op.
//! - Move and delete are soft: originals end up `DELETED`, never removed.

use crate::model::entity::EntityId;
use crate::model::filter::action_ids;
use crate::model::folder::NewsBin;
use crate::model::label::Label;
use crate::model::news::{News, NewsState};
use crate::store::{StoreRead, StoreResult, UnitOfWork};
use log::debug;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// News matched by one filter inside a batch.
pub struct MatchedNews<'a> {
    batch: &'a mut [News],
    indices: &'a [usize],
    dirty: &'a mut BTreeSet<usize>,
}

impl<'a> MatchedNews<'a> {
    pub(crate) fn new(
        batch: &'a mut [News],
        indices: &'a [usize],
        dirty: &'a mut BTreeSet<usize>,
    ) -> Self {
        Self {
            batch,
            indices,
            dirty,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &News> + '_ {
        self.indices.iter().map(|index| &self.batch[*index])
    }

    /// Runs `change` on every matched item; items it returns `true` for are
    /// saved at the end of the run.
    pub fn update(&mut self, mut change: impl FnMut(&mut News) -> bool) {
        for index in self.indices {
            if change(&mut self.batch[*index]) {
                self.dirty.insert(*index);
            }
        }
    }
}

/// Handler for one filter action id.
pub trait NewsAction: Send + Sync {
    fn apply(
        &self,
        uow: &mut UnitOfWork<'_>,
        data: Option<&Value>,
        news: &mut MatchedNews<'_>,
    ) -> StoreResult<()>;
}

/// Handlers keyed by action id.
pub struct ActionRegistry {
    handlers: BTreeMap<String, Box<dyn NewsAction>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(action_ids::MARK_READ, Box::new(SetState(NewsState::Read)));
        registry.register(action_ids::MARK_UNREAD, Box::new(SetState(NewsState::Unread)));
        registry.register(action_ids::MARK_STICKY, Box::new(MarkSticky));
        registry.register(action_ids::LABEL_NEWS, Box::new(LabelNews));
        registry.register(
            action_ids::COPY_NEWS,
            Box::new(CopyToBins {
                soft_delete_original: false,
            }),
        );
        registry.register(
            action_ids::MOVE_NEWS,
            Box::new(CopyToBins {
                soft_delete_original: true,
            }),
        );
        registry.register(action_ids::DELETE_NEWS, Box::new(SetState(NewsState::Deleted)));
        registry.register(action_ids::STOP_FILTER, Box::new(StopFilter));
        registry
    }
}

impl ActionRegistry {
    /// Registry without any handler.
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Registers `handler`, replacing an earlier one for the same id.
    pub fn register(&mut self, action_id: impl Into<String>, handler: Box<dyn NewsAction>) {
        self.handlers.insert(action_id.into(), handler);
    }

    pub fn get(&self, action_id: &str) -> Option<&dyn NewsAction> {
        self.handlers.get(action_id).map(|handler| handler.as_ref())
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

struct SetState(NewsState);

impl NewsAction for SetState {
    fn apply(
        &self,
        _uow: &mut UnitOfWork<'_>,
        _data: Option<&Value>,
        news: &mut MatchedNews<'_>,
    ) -> StoreResult<()> {
        let state = self.0;
        news.update(|item| {
            if item.state == state {
                return false;
            }
            item.state = state;
            true
        });
        Ok(())
    }
}

struct MarkSticky;

impl NewsAction for MarkSticky {
    fn apply(
        &self,
        _uow: &mut UnitOfWork<'_>,
        _data: Option<&Value>,
        news: &mut MatchedNews<'_>,
    ) -> StoreResult<()> {
        news.update(|item| !std::mem::replace(&mut item.sticky, true));
        Ok(())
    }
}

struct LabelNews;

impl NewsAction for LabelNews {
    fn apply(
        &self,
        uow: &mut UnitOfWork<'_>,
        data: Option<&Value>,
        news: &mut MatchedNews<'_>,
    ) -> StoreResult<()> {
        let label = match data.and_then(Value::as_i64) {
            Some(label_id) => uow.load::<Label>(label_id)?,
            None => None,
        };
        let Some(label) = label else {
            debug!(
                "event=filter_action module=filter status=skipped action=label_news reason=unknown_label"
            );
            return Ok(());
        };
        news.update(|item| item.add_label(&label));
        Ok(())
    }
}

struct CopyToBins {
    soft_delete_original: bool,
}

impl NewsAction for CopyToBins {
    fn apply(
        &self,
        uow: &mut UnitOfWork<'_>,
        data: Option<&Value>,
        news: &mut MatchedNews<'_>,
    ) -> StoreResult<()> {
        let bins = resolve_bins(uow, data)?;
        if bins.is_empty() {
            debug!(
                "event=filter_action module=filter status=skipped action={} reason=no_valid_bin",
                self.action_id()
            );
            return Ok(());
        }

        let originals: Vec<News> = news.iter().cloned().collect();
        for original in &originals {
            for bin_id in &bins {
                let mut copy = original.copy_into_bin(*bin_id);
                uow.save(&mut copy)?;
            }
        }
        if self.soft_delete_original {
            news.update(|item| {
                if item.state == NewsState::Deleted {
                    return false;
                }
                item.state = NewsState::Deleted;
                true
            });
        }
        Ok(())
    }
}

impl CopyToBins {
    fn action_id(&self) -> &'static str {
        if self.soft_delete_original {
            action_ids::MOVE_NEWS
        } else {
            action_ids::COPY_NEWS
        }
    }
}

/// Bin ids from action data that resolve to existing bins, deduplicated in
/// their given order.
fn resolve_bins(uow: &UnitOfWork<'_>, data: Option<&Value>) -> StoreResult<Vec<EntityId>> {
    let candidates: Vec<EntityId> = match data {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
        Some(other) => other.as_i64().into_iter().collect(),
        None => Vec::new(),
    };
    let mut bins = Vec::with_capacity(candidates.len());
    for bin_id in candidates {
        if bins.contains(&bin_id) {
            continue;
        }
        if uow.load::<NewsBin>(bin_id)?.is_some() {
            bins.push(bin_id);
        }
    }
    Ok(bins)
}

/// Marker handler; the engine itself ends processing for matched items.
struct StopFilter;

impl NewsAction for StopFilter {
    fn apply(
        &self,
        _uow: &mut UnitOfWork<'_>,
        _data: Option<&Value>,
        _news: &mut MatchedNews<'_>,
    ) -> StoreResult<()> {
        Ok(())
    }
}
