//! One atomic batch of saves and deletes.
//!
//! # Invariants
//! - All writes go through the wrapped transaction.
//! - Notices are only recorded here; dispatch happens after commit.

use crate::event::{ChangeSet, EventBatch};
use crate::model::entity::{Entity, EntityKind, EntityRef};
use crate::model::filter::SearchFilter;
use crate::repo::graph_repo::SqliteGraph;
use crate::repo::{self, label_repo};
use crate::store::merge::Merged;
use crate::store::ownership::{affected_ancestors, cascade_set_for};
use crate::store::{StoreError, StoreRead, StoreResult, StoredEntity};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;

/// Open unit of work. Dropping it without commit rolls back.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
    changes: ChangeSet,
}

impl<'conn> UnitOfWork<'conn> {
    pub(crate) fn new(tx: Transaction<'conn>) -> Self {
        Self {
            tx,
            changes: ChangeSet::default(),
        }
    }

    /// Saves `entity`, writing the reconciled result back into it.
    ///
    /// New entities get ids; saved ones are merged onto their persisted
    /// snapshot first.
    pub fn save<T: StoredEntity>(&mut self, entity: &mut T) -> StoreResult<()> {
        let mut added = Vec::new();
        match entity.id() {
            None => {
                *entity = T::fresh(entity);
                entity.insert_in(&self.tx, &mut added)?;
                let entity_ref = entity.entity_ref().ok_or(StoreError::Unsaved(T::KIND))?;
                self.changes.record_added(entity_ref);
                for nested in added {
                    self.changes.record_added(nested);
                }
                if let Some(folder_id) = entity.parent_folder() {
                    self.changes
                        .record_updated(EntityRef::new(EntityKind::Folder, folder_id));
                }
                entity.after_save(None, self)?;
            }
            Some(id) => {
                let persisted = T::load_in(&self.tx, id)?
                    .ok_or(StoreError::StaleEntity { kind: T::KIND, id })?;
                let Merged { mut value, removed } = T::merge(&persisted, entity);

                let removed_refs: Vec<EntityRef> =
                    removed.iter().filter_map(|item| item.entity_ref()).collect();
                let owners = affected_ancestors(&SqliteGraph::new(&self.tx), &removed_refs)?;
                for snapshot in removed {
                    if let Some(nested) = snapshot.entity_ref() {
                        repo::delete_row(&self.tx, nested)?;
                        self.changes.record_removed(nested, snapshot);
                    }
                }
                for owner in owners {
                    self.changes.record_updated(owner);
                }

                if !value.update_in(&self.tx, &mut added)? {
                    return Err(StoreError::StaleEntity { kind: T::KIND, id });
                }
                self.changes.record_updated(EntityRef::new(T::KIND, id));
                for nested in added {
                    self.changes.record_added(nested);
                }
                if persisted.parent_folder() != value.parent_folder() {
                    for folder_id in [persisted.parent_folder(), value.parent_folder()]
                        .into_iter()
                        .flatten()
                    {
                        self.changes
                            .record_updated(EntityRef::new(EntityKind::Folder, folder_id));
                    }
                }

                value.after_save(Some(&persisted), self)?;
                *entity = value;
            }
        }
        Ok(())
    }

    pub fn save_all<T: StoredEntity>(&mut self, entities: &mut [T]) -> StoreResult<()> {
        for entity in entities.iter_mut() {
            self.save(entity)?;
        }
        Ok(())
    }

    /// Deletes a saved entity together with its cascade.
    pub fn delete<T: Entity>(&mut self, entity: &T) -> StoreResult<()> {
        let entity_ref = entity.entity_ref().ok_or(StoreError::Unsaved(T::KIND))?;
        self.delete_all(&[entity_ref])?;
        Ok(())
    }

    /// Deletes every referenced entity and its cascade.
    ///
    /// References that no longer resolve are skipped. Returns the number of
    /// physically removed entities.
    pub fn delete_all(&mut self, entities: &[EntityRef]) -> StoreResult<usize> {
        let mut roots = Vec::with_capacity(entities.len());
        for entity in entities {
            if repo::exists(&self.tx, *entity)? {
                roots.push(*entity);
            } else {
                debug!("event=entity_delete module=store status=skipped entity={entity}");
            }
        }
        if roots.is_empty() {
            return Ok(0);
        }

        let graph = SqliteGraph::new(&self.tx);
        let removal = cascade_set_for(&graph, &roots)?;
        let owners = affected_ancestors(&graph, &removal)?;
        let removal_set: BTreeSet<EntityRef> = removal.iter().copied().collect();

        let mut label_carriers = Vec::new();
        for label in removal.iter().filter(|item| item.kind == EntityKind::Label) {
            for news_id in label_repo::news_ids_with_label(&self.tx, label.id)? {
                let news = EntityRef::new(EntityKind::News, news_id);
                if !removal_set.contains(&news) {
                    label_carriers.push(news);
                }
            }
        }

        let mut snapshots = Vec::with_capacity(removal.len());
        for entity in &removal {
            snapshots.push((*entity, repo::load_any(&self.tx, *entity)?));
        }
        for entity in removal.iter().rev() {
            repo::delete_row(&self.tx, *entity)?;
        }

        for (entity, snapshot) in snapshots {
            if let Some(snapshot) = snapshot {
                self.changes.record_removed(entity, snapshot);
            }
        }
        for owner in owners.into_iter().chain(label_carriers) {
            self.changes.record_updated(owner);
        }

        info!(
            "event=entity_delete module=store status=ok roots={} removed={}",
            roots.len(),
            removal.len()
        );
        Ok(removal.len())
    }

    /// Records that `filter` matched the saved news in `news`.
    pub fn record_filter_applied(&mut self, filter: &SearchFilter, news: Vec<EntityRef>) {
        self.changes.record_filter_applied(filter.clone(), news);
    }

    pub(crate) fn record_updated(&mut self, entity: EntityRef) {
        self.changes.record_updated(entity);
    }

    /// Resolves notices against the final state and commits.
    pub(crate) fn commit(self) -> StoreResult<EventBatch> {
        let Self { tx, changes } = self;
        let batch = changes.into_batch(|entity| repo::load_any(&tx, entity))?;
        tx.commit()?;
        Ok(batch)
    }
}

impl StoreRead for UnitOfWork<'_> {
    fn connection(&self) -> &Connection {
        &self.tx
    }
}
