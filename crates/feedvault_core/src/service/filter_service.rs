//! News filter engine.
//!
//! # Responsibility
//! - Run every enabled filter over a batch of reloaded news, in ascending
//!   order.
//! - Persist the batch and record one filter-applied notice per filter that
//!   matched anything.
//!
//! # Invariants
//! - A filter whose actions contain STOP ends processing for the items it
//!   matched; later filters never see them.
//! - Scoped filters only apply to news located inside their scope.
//! - `DELETED` items never match, including items deleted or moved by an
//!   earlier filter of the same run.
//! - The whole run is one unit of work.

use crate::model::entity::{EntityKind, EntityRef};
use crate::model::filter::SearchFilter;
use crate::model::folder::BookMark;
use crate::model::news::{now_epoch_ms, News, NewsState};
use crate::search::{matches_search, LocationIndex, MatchContext};
use crate::service::filter_actions::{ActionRegistry, MatchedNews};
use crate::store::{EntityStore, StoreRead, StoreResult, UnitOfWork};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Outcome of one filter over a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedFilter {
    pub filter: EntityRef,
    pub name: String,
    pub matched: usize,
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRunReport {
    pub applied: Vec<AppliedFilter>,
    /// Batch items written at the end of the run.
    pub saved: usize,
}

#[derive(Default)]
pub struct FilterEngine {
    registry: ActionRegistry,
}

impl FilterEngine {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    /// Runs all enabled filters over `news`, reloaded for `bookmark`, in
    /// its own unit of work.
    pub fn run(
        &self,
        store: &mut EntityStore,
        bookmark: &BookMark,
        news: &mut [News],
    ) -> StoreResult<FilterRunReport> {
        store.unit_of_work(|uow| self.run_in(uow, bookmark, news))
    }

    /// Runs the filters inside an open unit of work.
    ///
    /// Unsaved items and items changed by an action are saved before the
    /// method returns.
    pub fn run_in(
        &self,
        uow: &mut UnitOfWork<'_>,
        bookmark: &BookMark,
        news: &mut [News],
    ) -> StoreResult<FilterRunReport> {
        let filters = uow.enabled_filters()?;
        let index = LocationIndex::build(&*uow)?;
        let ctx = MatchContext {
            index: &index,
            now_ms: now_epoch_ms(),
        };

        let mut eligible: Vec<bool> = news
            .iter()
            .map(|item| item.state != NewsState::Deleted)
            .collect();
        let mut dirty = BTreeSet::new();
        let mut applied: Vec<(SearchFilter, Vec<usize>)> = Vec::new();

        for filter in filters {
            let matched: Vec<usize> = (0..news.len())
                .filter(|position| eligible[*position])
                .filter(|position| in_scope(&filter, &ctx, bookmark, &news[*position]))
                .filter(|position| filter_matches(&filter, &ctx, &news[*position]))
                .collect();
            if matched.is_empty() {
                continue;
            }

            for action in &filter.actions {
                match self.registry.get(&action.action_id) {
                    Some(handler) => handler.apply(
                        uow,
                        action.data.as_ref(),
                        &mut MatchedNews::new(news, &matched, &mut dirty),
                    )?,
                    None => warn!(
                        "event=filter_action module=filter status=skipped action={} reason=unknown_action",
                        action.action_id
                    ),
                }
            }
            let stop = filter.stops_processing();
            for position in &matched {
                if stop || news[*position].state == NewsState::Deleted {
                    eligible[*position] = false;
                }
            }
            debug!(
                "event=filter_apply module=filter status=ok filter={} matched={}",
                filter.name,
                matched.len()
            );
            applied.push((filter, matched));
        }

        let mut saved = 0;
        for (position, item) in news.iter_mut().enumerate() {
            if item.id.is_none() || dirty.contains(&position) {
                uow.save(item)?;
                saved += 1;
            }
        }

        let mut report = FilterRunReport {
            applied: Vec::with_capacity(applied.len()),
            saved,
        };
        for (filter, matched) in applied {
            let refs: Vec<EntityRef> = matched
                .iter()
                .filter_map(|position| news[*position].id)
                .map(|id| EntityRef::new(EntityKind::News, id))
                .collect();
            let filter_ref = filter
                .id
                .map(|id| EntityRef::new(EntityKind::SearchFilter, id));
            if let Some(filter_ref) = filter_ref {
                report.applied.push(AppliedFilter {
                    filter: filter_ref,
                    name: filter.name.clone(),
                    matched: matched.len(),
                });
            }
            uow.record_filter_applied(&filter, refs);
        }

        info!(
            "event=filter_run module=filter status=ok news={} filters_applied={} saved={}",
            news.len(),
            report.applied.len(),
            report.saved
        );
        Ok(report)
    }
}

/// Feed news are located at the bookmark being reloaded, bin news at
/// their bin.
fn in_scope(
    filter: &SearchFilter,
    ctx: &MatchContext<'_>,
    bookmark: &BookMark,
    news: &News,
) -> bool {
    let Some(scope) = filter.search.as_ref().and_then(|search| search.scope()) else {
        return true;
    };
    let location = match news.bin_id {
        Some(bin_id) => Some(EntityRef::new(EntityKind::NewsBin, bin_id)),
        None => bookmark.id.map(|id| EntityRef::new(EntityKind::BookMark, id)),
    };
    location.is_some_and(|location| ctx.index.contains(scope, location))
}

fn filter_matches(filter: &SearchFilter, ctx: &MatchContext<'_>, news: &News) -> bool {
    if filter.match_all_news {
        return true;
    }
    match filter.search.as_ref() {
        Some(search) => matches_search(search, news, ctx),
        None => false,
    }
}
