//! Raw mutation notices and their coalesced, grouped form.
//!
//! # Responsibility
//! - Collect Added/Updated/Removed notices during one unit of work.
//! - Apply suppression and coalescing before dispatch.
//! - Group the surviving notices per entity kind and change kind.
//!
//! # Invariants
//! - An entity with a Removed notice never also appears as Updated.
//! - An entity Added in the same unit of work is reported as Added only.
//! - Each entity appears at most once per (kind, change) group.
//! - A filter-applied notice keeps every matched news; news removed later in
//!   the same unit of work are reported with their removal snapshot.

use crate::model::entity::{AnyEntity, EntityKind, EntityRef};
use crate::model::filter::SearchFilter;
use crate::model::news::News;
use crate::repo::RepoResult;
use std::collections::{BTreeMap, BTreeSet};

/// Change kind of one notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [Self::Added, Self::Updated, Self::Removed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        }
    }
}

/// Notices collected by one unit of work.
#[derive(Debug, Default)]
pub struct ChangeSet {
    added: BTreeSet<EntityRef>,
    updated: BTreeSet<EntityRef>,
    removed: BTreeMap<EntityRef, AnyEntity>,
    filters_applied: Vec<(SearchFilter, Vec<EntityRef>)>,
}

impl ChangeSet {
    pub fn record_added(&mut self, entity: EntityRef) {
        self.added.insert(entity);
    }

    pub fn record_updated(&mut self, entity: EntityRef) {
        self.updated.insert(entity);
    }

    /// Records a removal with the snapshot taken before the row went away.
    pub fn record_removed(&mut self, entity: EntityRef, snapshot: AnyEntity) {
        self.removed.insert(entity, snapshot);
    }

    pub fn record_filter_applied(&mut self, filter: SearchFilter, news: Vec<EntityRef>) {
        self.filters_applied.push((filter, news));
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
            && self.filters_applied.is_empty()
    }

    /// Applies suppression and coalescing, then resolves current snapshots
    /// for Added/Updated notices through `resolve`.
    ///
    /// Added/Updated notices whose entity no longer resolves are dropped.
    pub fn into_batch(
        self,
        mut resolve: impl FnMut(EntityRef) -> RepoResult<Option<AnyEntity>>,
    ) -> RepoResult<EventBatch> {
        let mut batch = EventBatch::default();

        for entity in &self.added {
            if self.removed.contains_key(entity) {
                continue;
            }
            if let Some(snapshot) = resolve(*entity)? {
                batch.push(entity.kind, ChangeKind::Added, snapshot);
            }
        }
        for entity in &self.updated {
            if self.removed.contains_key(entity) || self.added.contains(entity) {
                continue;
            }
            if let Some(snapshot) = resolve(*entity)? {
                batch.push(entity.kind, ChangeKind::Updated, snapshot);
            }
        }
        for (filter, news_refs) in self.filters_applied {
            let mut news = Vec::with_capacity(news_refs.len());
            for news_ref in news_refs {
                let snapshot = match self.removed.get(&news_ref) {
                    Some(removed) => Some(removed.clone()),
                    None => resolve(news_ref)?,
                };
                if let Some(AnyEntity::News(item)) = snapshot {
                    news.push(item);
                }
            }
            batch.filters_applied.push(FilterApplied { filter, news });
        }

        for (entity, snapshot) in self.removed {
            batch.push(entity.kind, ChangeKind::Removed, snapshot);
        }

        Ok(batch)
    }
}

/// Entities touched for one entity kind, split per change kind.
#[derive(Debug, Clone, Default)]
pub struct KindGroup {
    pub added: Vec<AnyEntity>,
    pub updated: Vec<AnyEntity>,
    pub removed: Vec<AnyEntity>,
}

impl KindGroup {
    pub fn get(&self, change: ChangeKind) -> &[AnyEntity] {
        match change {
            ChangeKind::Added => &self.added,
            ChangeKind::Updated => &self.updated,
            ChangeKind::Removed => &self.removed,
        }
    }
}

/// One applied filter and the persisted news it matched.
#[derive(Debug, Clone)]
pub struct FilterApplied {
    pub filter: SearchFilter,
    pub news: Vec<News>,
}

/// Coalesced notices of one committed unit of work.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    groups: BTreeMap<EntityKind, KindGroup>,
    filters_applied: Vec<FilterApplied>,
}

impl EventBatch {
    fn push(&mut self, kind: EntityKind, change: ChangeKind, entity: AnyEntity) {
        let group = self.groups.entry(kind).or_default();
        match change {
            ChangeKind::Added => group.added.push(entity),
            ChangeKind::Updated => group.updated.push(entity),
            ChangeKind::Removed => group.removed.push(entity),
        }
    }

    pub fn group(&self, kind: EntityKind) -> Option<&KindGroup> {
        self.groups.get(&kind)
    }

    /// Entities of `kind` with notice `change`; empty when none.
    pub fn entities(&self, kind: EntityKind, change: ChangeKind) -> &[AnyEntity] {
        self.groups
            .get(&kind)
            .map(|group| group.get(change))
            .unwrap_or(&[])
    }

    pub fn filters_applied(&self) -> &[FilterApplied] {
        &self.filters_applied
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.filters_applied.is_empty()
    }

    /// Total notices across every group.
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .map(|group| group.added.len() + group.updated.len() + group.removed.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeKind, ChangeSet};
    use crate::model::entity::{AnyEntity, EntityKind, EntityRef};
    use crate::model::folder::Folder;

    fn folder(id: i64) -> AnyEntity {
        let mut folder = Folder::new(None, format!("F{id}"));
        folder.id = Some(id);
        folder.into()
    }

    fn resolve(entity: EntityRef) -> crate::repo::RepoResult<Option<AnyEntity>> {
        Ok(Some(folder(entity.id)))
    }

    #[test]
    fn removed_suppresses_updated_and_duplicates_coalesce() {
        let mut changes = ChangeSet::default();
        let kept = EntityRef::new(EntityKind::Folder, 1);
        let gone = EntityRef::new(EntityKind::Folder, 2);
        changes.record_updated(kept);
        changes.record_updated(kept);
        changes.record_updated(gone);
        changes.record_removed(gone, folder(2));

        let batch = changes.into_batch(resolve).unwrap();
        assert_eq!(batch.entities(EntityKind::Folder, ChangeKind::Updated).len(), 1);
        assert_eq!(batch.entities(EntityKind::Folder, ChangeKind::Removed).len(), 1);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn added_absorbs_updated_for_same_entity() {
        let mut changes = ChangeSet::default();
        let entity = EntityRef::new(EntityKind::Folder, 3);
        changes.record_added(entity);
        changes.record_updated(entity);

        let batch = changes.into_batch(resolve).unwrap();
        assert_eq!(batch.entities(EntityKind::Folder, ChangeKind::Added).len(), 1);
        assert!(batch.entities(EntityKind::Folder, ChangeKind::Updated).is_empty());
    }

    #[test]
    fn filter_notice_keeps_news_removed_later() {
        use crate::model::filter::SearchFilter;
        use crate::model::news::News;

        let mut purged = News::new("https://example.com/feed.xml");
        purged.id = Some(4);
        let purged_ref = EntityRef::new(EntityKind::News, 4);
        let mut changes = ChangeSet::default();
        changes.record_filter_applied(SearchFilter::new("Drop", 0), vec![purged_ref]);
        changes.record_removed(purged_ref, purged.into());

        let batch = changes.into_batch(|_| Ok(None)).unwrap();
        assert_eq!(batch.filters_applied().len(), 1);
        assert_eq!(batch.filters_applied()[0].news.len(), 1);
        assert_eq!(batch.filters_applied()[0].news[0].id, Some(4));
        assert_eq!(batch.entities(EntityKind::News, ChangeKind::Removed).len(), 1);
    }

    #[test]
    fn unresolvable_notices_are_dropped() {
        let mut changes = ChangeSet::default();
        changes.record_updated(EntityRef::new(EntityKind::News, 8));
        let batch = changes.into_batch(|_| Ok(None)).unwrap();
        assert!(batch.is_empty());
    }
}
