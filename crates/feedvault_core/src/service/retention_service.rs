//! Post-reload news retention.
//!
//! # Responsibility
//! - Physically purge soft-deleted news of a feed.
//! - Enforce the age and count caps of the effective retention policy.
//!
//! # Invariants
//! - Sticky news are never purged by a cap.
//! - Unread and labeled news are protected when the policy says so.
//! - The count cap removes the oldest unprotected news first.

use crate::model::entity::{EntityKind, EntityRef};
use crate::model::folder::BookMark;
use crate::model::news::{now_epoch_ms, News, NewsState};
use crate::prefs::{PreferenceScope, RetentionPolicy};
use crate::store::{EntityStore, StoreRead, StoreResult, UnitOfWork};
use log::info;
use std::collections::BTreeSet;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// News purged by one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub deleted: usize,
    pub expired: usize,
    pub over_count: usize,
}

impl RetentionReport {
    pub fn total(&self) -> usize {
        self.deleted + self.expired + self.over_count
    }
}

pub struct RetentionService<P: PreferenceScope> {
    prefs: P,
}

impl<P: PreferenceScope> RetentionService<P> {
    pub fn new(prefs: P) -> Self {
        Self { prefs }
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    /// Runs one retention pass for `bookmark` in its own unit of work.
    pub fn purge_now(
        &self,
        store: &mut EntityStore,
        bookmark: &BookMark,
    ) -> StoreResult<RetentionReport> {
        store.unit_of_work(|uow| self.purge(uow, bookmark))
    }

    /// Runs one retention pass inside an open unit of work.
    pub fn purge(
        &self,
        uow: &mut UnitOfWork<'_>,
        bookmark: &BookMark,
    ) -> StoreResult<RetentionReport> {
        let policy = self.prefs.retention_policy(bookmark);
        let news = uow.news_of_feed(&bookmark.feed_link)?;
        let plan = plan_purge(&news, &policy, now_epoch_ms());
        if plan.targets.is_empty() {
            return Ok(plan.report);
        }

        uow.delete_all(&plan.targets)?;
        info!(
            "event=retention_purge module=retention status=ok feed={} deleted={} expired={} over_count={}",
            bookmark.feed_link, plan.report.deleted, plan.report.expired, plan.report.over_count
        );
        Ok(plan.report)
    }
}

struct PurgePlan {
    targets: Vec<EntityRef>,
    report: RetentionReport,
}

fn plan_purge(news: &[News], policy: &RetentionPolicy, now_ms: i64) -> PurgePlan {
    let mut report = RetentionReport::default();
    let mut purged: BTreeSet<usize> = BTreeSet::new();
    let protected = |item: &News| {
        item.sticky
            || (policy.keep_unread && item.state.is_unread())
            || (policy.keep_labeled && !item.labels.is_empty())
    };

    for (position, item) in news.iter().enumerate() {
        if item.state == NewsState::Deleted {
            purged.insert(position);
            report.deleted += 1;
        }
    }

    if policy.delete_by_age {
        let cutoff = now_ms - i64::from(policy.max_age_days) * DAY_MS;
        for (position, item) in news.iter().enumerate() {
            if !purged.contains(&position) && !protected(item) && item.effective_date() < cutoff {
                purged.insert(position);
                report.expired += 1;
            }
        }
    }

    if policy.delete_by_count {
        let mut remaining: Vec<usize> = (0..news.len())
            .filter(|position| !purged.contains(position))
            .collect();
        // Oldest first.
        remaining.sort_by_key(|position| (news[*position].effective_date(), news[*position].id));
        let mut excess = remaining.len().saturating_sub(policy.max_count);
        for position in remaining {
            if excess == 0 {
                break;
            }
            if !protected(&news[position]) {
                purged.insert(position);
                report.over_count += 1;
                excess -= 1;
            }
        }
    }

    let targets = purged
        .into_iter()
        .filter_map(|position| news[position].id)
        .map(|id| EntityRef::new(EntityKind::News, id))
        .collect();
    PurgePlan { targets, report }
}

#[cfg(test)]
mod tests {
    use super::{plan_purge, DAY_MS};
    use crate::model::label::Label;
    use crate::model::news::{News, NewsState};
    use crate::prefs::RetentionPolicy;

    const NOW: i64 = 100 * DAY_MS;

    fn news(id: i64, age_days: i64, state: NewsState) -> News {
        let mut item = News::new("https://example.com/rss");
        item.id = Some(id);
        item.publish_date = Some(NOW - age_days * DAY_MS);
        item.state = state;
        item
    }

    #[test]
    fn count_cap_drops_oldest_unprotected() {
        let mut sticky = news(1, 10, NewsState::Read);
        sticky.sticky = true;
        let items = vec![
            sticky,
            news(2, 9, NewsState::Read),
            news(3, 8, NewsState::Unread),
            news(4, 7, NewsState::Read),
            news(5, 1, NewsState::Read),
        ];
        let policy = RetentionPolicy {
            max_count: 3,
            ..RetentionPolicy::default()
        };

        let plan = plan_purge(&items, &policy, NOW);
        let ids: Vec<i64> = plan.targets.iter().map(|target| target.id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(plan.report.over_count, 2);
    }

    #[test]
    fn age_cap_respects_labels_and_deleted_always_go() {
        let mut labeled = news(1, 40, NewsState::Read);
        let mut label = Label::new("keep");
        label.id = Some(9);
        labeled.add_label(&label);
        let items = vec![
            labeled,
            news(2, 40, NewsState::Read),
            news(3, 1, NewsState::Deleted),
            news(4, 2, NewsState::Read),
        ];
        let policy = RetentionPolicy {
            delete_by_count: false,
            delete_by_age: true,
            max_age_days: 30,
            ..RetentionPolicy::default()
        };

        let plan = plan_purge(&items, &policy, NOW);
        let ids: Vec<i64> = plan.targets.iter().map(|target| target.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(plan.report.deleted, 1);
        assert_eq!(plan.report.expired, 1);
    }
}
