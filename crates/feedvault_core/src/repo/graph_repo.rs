//! SQLite answers to ownership queries.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::repo::{query_ids, query_one, RepoResult};
use crate::store::ownership::OwnershipLookup;
use rusqlite::Connection;

/// Ownership lookup over one connection (usually an open transaction).
pub struct SqliteGraph<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraph<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn single_id(&self, sql: &str, id: EntityId) -> RepoResult<Option<EntityId>> {
        let value: Option<Option<EntityId>> =
            query_one(self.conn, sql, [id], |row| Ok(row.get(0)?))?;
        Ok(value.flatten())
    }
}

impl OwnershipLookup for SqliteGraph<'_> {
    fn owned_by(&self, owner: EntityRef, owned_kind: EntityKind) -> RepoResult<Vec<EntityId>> {
        let sql = match (owner.kind, owned_kind) {
            (EntityKind::Folder, EntityKind::Folder) => {
                "SELECT id FROM folders WHERE parent_id = ?1 ORDER BY position ASC, id ASC;"
            }
            (EntityKind::Folder, EntityKind::BookMark) => {
                "SELECT id FROM marks WHERE folder_id = ?1 AND kind = 'bookmark' ORDER BY id ASC;"
            }
            (EntityKind::Folder, EntityKind::SearchMark) => {
                "SELECT id FROM marks WHERE folder_id = ?1 AND kind = 'search_mark' ORDER BY id ASC;"
            }
            (EntityKind::Folder, EntityKind::NewsBin) => {
                "SELECT id FROM marks WHERE folder_id = ?1 AND kind = 'news_bin' ORDER BY id ASC;"
            }
            (EntityKind::BookMark, EntityKind::Feed) => {
                "SELECT f.id FROM feeds f
                 INNER JOIN marks m ON m.feed_link = f.link
                 WHERE m.id = ?1 AND m.kind = 'bookmark';"
            }
            (EntityKind::Feed, EntityKind::News) => {
                "SELECT n.id FROM news n
                 INNER JOIN feeds f ON f.link = n.feed_link
                 WHERE f.id = ?1 AND n.bin_id IS NULL
                 ORDER BY n.id ASC;"
            }
            (EntityKind::NewsBin, EntityKind::News) => {
                "SELECT id FROM news WHERE bin_id = ?1 ORDER BY id ASC;"
            }
            (EntityKind::News, EntityKind::Category) => {
                "SELECT id FROM categories WHERE news_id = ?1 ORDER BY id ASC;"
            }
            (EntityKind::News, EntityKind::Person) => {
                "SELECT id FROM persons WHERE news_id = ?1;"
            }
            (EntityKind::News, EntityKind::Attachment) => {
                "SELECT id FROM attachments WHERE news_id = ?1 ORDER BY id ASC;"
            }
            (EntityKind::SearchMark, EntityKind::SearchCondition) => {
                "SELECT id FROM search_conditions WHERE search_mark_id = ?1 ORDER BY id ASC;"
            }
            (EntityKind::Search, EntityKind::SearchCondition) => {
                "SELECT id FROM search_conditions WHERE search_id = ?1 ORDER BY id ASC;"
            }
            (EntityKind::SearchFilter, EntityKind::Search) => {
                "SELECT id FROM searches WHERE filter_id = ?1;"
            }
            (EntityKind::SearchFilter, EntityKind::FilterAction) => {
                "SELECT id FROM filter_actions WHERE filter_id = ?1 ORDER BY id ASC;"
            }
            _ => return Ok(Vec::new()),
        };
        query_ids(self.conn, sql, [owner.id])
    }

    fn owner_of(&self, entity: EntityRef) -> RepoResult<Option<EntityRef>> {
        let id = entity.id;
        let owner = match entity.kind {
            EntityKind::Folder => self
                .single_id("SELECT parent_id FROM folders WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::Folder, owner)),
            EntityKind::BookMark | EntityKind::SearchMark | EntityKind::NewsBin => self
                .single_id("SELECT folder_id FROM marks WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::Folder, owner)),
            EntityKind::News => {
                match self.single_id("SELECT bin_id FROM news WHERE id = ?1;", id)? {
                    Some(bin_id) => Some(EntityRef::new(EntityKind::NewsBin, bin_id)),
                    None => self
                        .single_id(
                            "SELECT f.id FROM feeds f
                             INNER JOIN news n ON n.feed_link = f.link
                             WHERE n.id = ?1;",
                            id,
                        )?
                        .map(|owner| EntityRef::new(EntityKind::Feed, owner)),
                }
            }
            EntityKind::Category => self
                .single_id("SELECT news_id FROM categories WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::News, owner)),
            EntityKind::Person => self
                .single_id("SELECT news_id FROM persons WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::News, owner)),
            EntityKind::Attachment => self
                .single_id("SELECT news_id FROM attachments WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::News, owner)),
            EntityKind::SearchCondition => {
                match self.single_id(
                    "SELECT search_mark_id FROM search_conditions WHERE id = ?1;",
                    id,
                )? {
                    Some(mark_id) => Some(EntityRef::new(EntityKind::SearchMark, mark_id)),
                    None => self
                        .single_id("SELECT search_id FROM search_conditions WHERE id = ?1;", id)?
                        .map(|owner| EntityRef::new(EntityKind::Search, owner)),
                }
            }
            EntityKind::Search => self
                .single_id("SELECT filter_id FROM searches WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::SearchFilter, owner)),
            EntityKind::FilterAction => self
                .single_id("SELECT filter_id FROM filter_actions WHERE id = ?1;", id)?
                .map(|owner| EntityRef::new(EntityKind::SearchFilter, owner)),
            EntityKind::Feed | EntityKind::Label | EntityKind::SearchFilter => None,
        };
        Ok(owner)
    }

    fn referrers_of(&self, shared: EntityRef) -> RepoResult<Vec<EntityRef>> {
        if shared.kind != EntityKind::Feed {
            return Ok(Vec::new());
        }
        let ids = query_ids(
            self.conn,
            "SELECT m.id FROM marks m
             INNER JOIN feeds f ON f.link = m.feed_link
             WHERE f.id = ?1 AND m.kind = 'bookmark'
             ORDER BY m.id ASC;",
            [shared.id],
        )?;
        Ok(ids
            .into_iter()
            .map(|id| EntityRef::new(EntityKind::BookMark, id))
            .collect())
    }
}
