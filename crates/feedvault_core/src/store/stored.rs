//! Per-type persistence hooks used by the unit of work.

use crate::model::entity::{Entity, EntityId, EntityKind, EntityRef};
use crate::model::feed::Feed;
use crate::model::filter::SearchFilter;
use crate::model::folder::{BookMark, Folder, NewsBin, SearchMark};
use crate::model::label::Label;
use crate::model::news::{News, NewsState};
use crate::repo::{
    feed_repo, filter_repo, folder_repo, label_repo, mark_repo, news_repo, RepoResult,
};
use crate::store::merge::Merge;
use crate::store::{StoreRead, StoreResult, UnitOfWork};
use log::debug;
use rusqlite::Connection;

/// Top-level entity the store can save directly.
///
/// Nested entities (categories, authors, attachments, conditions, searches
/// and actions) are saved through their owner.
pub trait StoredEntity: Entity + Merge {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>>;

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>>;

    /// Inserts a new row and assigns ids, pushing nested rows into `added`.
    fn insert_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<()>;

    /// Updates an existing row. Returns `false` when it no longer exists.
    fn update_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<bool>;

    /// Folder whose child list holds this entity.
    fn parent_folder(&self) -> Option<EntityId> {
        None
    }

    /// Runs inside the unit of work after the row is written.
    fn after_save(&self, previous: Option<&Self>, uow: &mut UnitOfWork<'_>) -> StoreResult<()> {
        let _ = (previous, uow);
        Ok(())
    }
}

impl StoredEntity for Folder {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        folder_repo::load(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        folder_repo::load_all(conn)
    }

    fn insert_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<()> {
        folder_repo::insert(conn, self)
    }

    fn update_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        folder_repo::update(conn, self)
    }

    fn parent_folder(&self) -> Option<EntityId> {
        self.parent_id
    }
}

impl StoredEntity for BookMark {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        mark_repo::load_bookmark(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        mark_repo::load_all_bookmarks(conn)
    }

    fn insert_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<()> {
        mark_repo::insert_bookmark(conn, self)
    }

    fn update_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        mark_repo::update_bookmark(conn, self)
    }

    fn parent_folder(&self) -> Option<EntityId> {
        Some(self.folder_id)
    }
}

impl StoredEntity for SearchMark {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        mark_repo::load_search_mark(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        mark_repo::load_all_search_marks(conn)
    }

    fn insert_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<()> {
        mark_repo::insert_search_mark(conn, self, added)
    }

    fn update_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        mark_repo::update_search_mark(conn, self, added)
    }

    fn parent_folder(&self) -> Option<EntityId> {
        Some(self.folder_id)
    }
}

impl StoredEntity for NewsBin {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        mark_repo::load_news_bin(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        mark_repo::load_all_news_bins(conn)
    }

    fn insert_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<()> {
        mark_repo::insert_news_bin(conn, self)
    }

    fn update_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        mark_repo::update_news_bin(conn, self)
    }

    fn parent_folder(&self) -> Option<EntityId> {
        Some(self.folder_id)
    }
}

impl StoredEntity for Feed {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        feed_repo::load(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        feed_repo::load_all(conn)
    }

    fn insert_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<()> {
        feed_repo::insert(conn, self)
    }

    fn update_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        feed_repo::update(conn, self)
    }
}

impl StoredEntity for Label {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        label_repo::load(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        label_repo::load_all(conn)
    }

    fn insert_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<()> {
        label_repo::insert(conn, self)
    }

    fn update_in(&mut self, conn: &Connection, _added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        label_repo::update(conn, self)
    }
}

impl StoredEntity for SearchFilter {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        filter_repo::load(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        filter_repo::load_all(conn)
    }

    fn insert_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<()> {
        filter_repo::insert(conn, self, added)
    }

    fn update_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        filter_repo::update(conn, self, added)
    }
}

impl StoredEntity for News {
    fn load_in(conn: &Connection, id: EntityId) -> RepoResult<Option<Self>> {
        news_repo::load(conn, id)
    }

    fn load_all_in(conn: &Connection) -> RepoResult<Vec<Self>> {
        news_repo::load_all(conn)
    }

    fn insert_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<()> {
        news_repo::insert(conn, self, added)
    }

    fn update_in(&mut self, conn: &Connection, added: &mut Vec<EntityRef>) -> RepoResult<bool> {
        news_repo::update(conn, self, added)
    }

    /// Shares a READ/UNREAD transition with every news carrying the same link.
    ///
    /// A fresh insert counts as a transition from NEW.
    fn after_save(&self, previous: Option<&Self>, uow: &mut UnitOfWork<'_>) -> StoreResult<()> {
        let (Some(id), Some(link)) = (self.id, self.link.as_deref()) else {
            return Ok(());
        };
        let previous_state = previous.map_or(NewsState::New, |previous| previous.state);
        if previous_state == self.state
            || !matches!(self.state, NewsState::Read | NewsState::Unread)
        {
            return Ok(());
        }

        let changed = news_repo::propagate_state(uow.connection(), link, id, self.state)?;
        if !changed.is_empty() {
            debug!(
                "event=state_propagate module=store status=ok news={} state={} siblings={}",
                id,
                self.state.as_str(),
                changed.len()
            );
        }
        for sibling in changed {
            uow.record_updated(EntityRef::new(EntityKind::News, sibling));
        }
        Ok(())
    }
}
