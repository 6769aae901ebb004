//! SQLite row mappers for every persisted entity.
//!
//! # Responsibility
//! - Keep SQL details inside the persistence boundary.
//! - Map rows to model types and back, including nested collections.
//! - Answer ownership questions for the cascade resolver.
//!
//! # Invariants
//! - Read paths reject invalid persisted state instead of masking it.
//! - Repositories never open transactions; callers pass a connection that
//!   is already inside one when atomicity matters.

use crate::db::DbError;
use crate::model::entity::{AnyEntity, EntityId, EntityKind, EntityRef};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod feed_repo;
pub mod filter_repo;
pub mod folder_repo;
pub mod graph_repo;
pub mod label_repo;
pub mod mark_repo;
pub mod news_repo;
pub mod search_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(format!("json payload: {value}"))
    }
}

/// Table holding rows of `kind`.
pub(crate) fn table_for(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Folder => "folders",
        EntityKind::BookMark | EntityKind::SearchMark | EntityKind::NewsBin => "marks",
        EntityKind::Feed => "feeds",
        EntityKind::News => "news",
        EntityKind::Category => "categories",
        EntityKind::Person => "persons",
        EntityKind::Attachment => "attachments",
        EntityKind::Label => "labels",
        EntityKind::Search => "searches",
        EntityKind::SearchCondition => "search_conditions",
        EntityKind::SearchFilter => "search_filters",
        EntityKind::FilterAction => "filter_actions",
    }
}

/// Value of `marks.kind` for mark kinds.
pub(crate) fn mark_kind_to_db(kind: EntityKind) -> Option<&'static str> {
    match kind {
        EntityKind::BookMark => Some("bookmark"),
        EntityKind::SearchMark => Some("search_mark"),
        EntityKind::NewsBin => Some("news_bin"),
        _ => None,
    }
}

pub(crate) fn parse_mark_kind(value: &str) -> Option<EntityKind> {
    match value {
        "bookmark" => Some(EntityKind::BookMark),
        "search_mark" => Some(EntityKind::SearchMark),
        "news_bin" => Some(EntityKind::NewsBin),
        _ => None,
    }
}

/// Returns whether a row for `entity` exists.
pub fn exists(conn: &Connection, entity: EntityRef) -> RepoResult<bool> {
    let table = table_for(entity.kind);
    let found = match mark_kind_to_db(entity.kind) {
        Some(mark_kind) => conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE id = ?1 AND kind = ?2;"),
                params![entity.id, mark_kind],
                |_| Ok(()),
            )
            .optional()?,
        None => conn
            .query_row(
                &format!("SELECT 1 FROM {table} WHERE id = ?1;"),
                [entity.id],
                |_| Ok(()),
            )
            .optional()?,
    };
    Ok(found.is_some())
}

/// Deletes the row for `entity` and its association links.
///
/// Owned rows are not touched; the cascade resolver deletes them first.
pub fn delete_row(conn: &Connection, entity: EntityRef) -> RepoResult<bool> {
    match entity.kind {
        EntityKind::News => {
            conn.execute("DELETE FROM news_labels WHERE news_id = ?1;", [entity.id])?;
        }
        EntityKind::Label => {
            conn.execute("DELETE FROM news_labels WHERE label_id = ?1;", [entity.id])?;
        }
        _ => {}
    }

    let table = table_for(entity.kind);
    let changed = match mark_kind_to_db(entity.kind) {
        Some(mark_kind) => conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?1 AND kind = ?2;"),
            params![entity.id, mark_kind],
        )?,
        None => conn.execute(&format!("DELETE FROM {table} WHERE id = ?1;"), [entity.id])?,
    };
    Ok(changed > 0)
}

/// Loads any entity by reference.
pub fn load_any(conn: &Connection, entity: EntityRef) -> RepoResult<Option<AnyEntity>> {
    let id = entity.id;
    let loaded = match entity.kind {
        EntityKind::Folder => folder_repo::load(conn, id)?.map(AnyEntity::from),
        EntityKind::BookMark => mark_repo::load_bookmark(conn, id)?.map(AnyEntity::from),
        EntityKind::SearchMark => mark_repo::load_search_mark(conn, id)?.map(AnyEntity::from),
        EntityKind::NewsBin => mark_repo::load_news_bin(conn, id)?.map(AnyEntity::from),
        EntityKind::Feed => feed_repo::load(conn, id)?.map(AnyEntity::from),
        EntityKind::News => news_repo::load(conn, id)?.map(AnyEntity::from),
        EntityKind::Category => news_repo::load_category(conn, id)?.map(AnyEntity::from),
        EntityKind::Person => news_repo::load_person(conn, id)?.map(AnyEntity::from),
        EntityKind::Attachment => news_repo::load_attachment(conn, id)?.map(AnyEntity::from),
        EntityKind::Label => label_repo::load(conn, id)?.map(AnyEntity::from),
        EntityKind::Search => filter_repo::load_search(conn, id)?.map(AnyEntity::from),
        EntityKind::SearchCondition => {
            search_repo::load_condition(conn, id)?.map(AnyEntity::from)
        }
        EntityKind::SearchFilter => filter_repo::load(conn, id)?.map(AnyEntity::from),
        EntityKind::FilterAction => filter_repo::load_action(conn, id)?.map(AnyEntity::from),
    };
    Ok(loaded)
}

/// Runs `sql` and parses every row.
pub(crate) fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(parse(row)?);
    }
    Ok(out)
}

/// Runs `sql` and parses the first row, if any.
pub(crate) fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: impl Fn(&Row<'_>) -> RepoResult<T>,
) -> RepoResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(parse(row)?)),
        None => Ok(None),
    }
}

/// Collects a single id column.
pub(crate) fn query_ids<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> RepoResult<Vec<EntityId>> {
    query_all(conn, sql, params, |row| Ok(row.get::<_, EntityId>(0)?))
}

#[cfg(test)]
mod tests {
    use super::{delete_row, exists, load_any, mark_kind_to_db, parse_mark_kind};
    use crate::db::open_db_in_memory;
    use crate::model::entity::{EntityKind, EntityRef};
    use crate::model::folder::Folder;
    use crate::repo::folder_repo;

    #[test]
    fn mark_kind_names_round_trip() {
        for kind in [EntityKind::BookMark, EntityKind::SearchMark, EntityKind::NewsBin] {
            let name = mark_kind_to_db(kind).unwrap();
            assert_eq!(parse_mark_kind(name), Some(kind));
        }
        assert_eq!(mark_kind_to_db(EntityKind::Folder), None);
    }

    #[test]
    fn delete_row_removes_only_the_target() {
        let conn = open_db_in_memory().unwrap();
        let mut folder = Folder::new(None, "Root");
        folder_repo::insert(&conn, &mut folder).unwrap();
        let folder_ref = EntityRef::new(EntityKind::Folder, folder.id.unwrap());

        assert!(exists(&conn, folder_ref).unwrap());
        assert!(load_any(&conn, folder_ref).unwrap().is_some());
        assert!(!exists(&conn, EntityRef::new(EntityKind::NewsBin, folder_ref.id)).unwrap());

        assert!(delete_row(&conn, folder_ref).unwrap());
        assert!(!delete_row(&conn, folder_ref).unwrap());
        assert!(load_any(&conn, folder_ref).unwrap().is_none());
    }
}
