//! Persistence for the three mark variants stored in `marks`.
//!
//! # Invariants
//! - Only bookmarks carry `feed_link`.
//! - Search-mark conditions are written in list order.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::folder::{BookMark, NewsBin, SearchMark};
use crate::repo::folder_repo::next_child_position;
use crate::repo::search_repo::{self, ConditionOwner};
use crate::repo::{mark_kind_to_db, query_all, query_one, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const MARK_SELECT_SQL: &str =
    "SELECT id, kind, folder_id, name, feed_link, match_all_conditions FROM marks";

struct MarkRow {
    id: EntityId,
    folder_id: EntityId,
    name: String,
    feed_link: Option<String>,
    match_all_conditions: bool,
}

pub fn load_bookmark(conn: &Connection, id: EntityId) -> RepoResult<Option<BookMark>> {
    load_row(conn, EntityKind::BookMark, id)?
        .map(bookmark_from_row)
        .transpose()
}

pub fn load_search_mark(conn: &Connection, id: EntityId) -> RepoResult<Option<SearchMark>> {
    match load_row(conn, EntityKind::SearchMark, id)? {
        Some(row) => Ok(Some(search_mark_from_row(conn, row)?)),
        None => Ok(None),
    }
}

pub fn load_news_bin(conn: &Connection, id: EntityId) -> RepoResult<Option<NewsBin>> {
    Ok(load_row(conn, EntityKind::NewsBin, id)?.map(news_bin_from_row))
}

pub fn load_all_bookmarks(conn: &Connection) -> RepoResult<Vec<BookMark>> {
    load_rows(conn, EntityKind::BookMark)?
        .into_iter()
        .map(bookmark_from_row)
        .collect()
}

pub fn load_all_search_marks(conn: &Connection) -> RepoResult<Vec<SearchMark>> {
    load_rows(conn, EntityKind::SearchMark)?
        .into_iter()
        .map(|row| search_mark_from_row(conn, row))
        .collect()
}

pub fn load_all_news_bins(conn: &Connection) -> RepoResult<Vec<NewsBin>> {
    Ok(load_rows(conn, EntityKind::NewsBin)?
        .into_iter()
        .map(news_bin_from_row)
        .collect())
}

/// Bookmarks whose feed link equals `link`.
pub fn bookmarks_for_link(conn: &Connection, link: &str) -> RepoResult<Vec<BookMark>> {
    query_all(
        conn,
        &format!("{MARK_SELECT_SQL} WHERE kind = 'bookmark' AND feed_link = ?1 ORDER BY id ASC;"),
        [link],
        parse_mark_row,
    )?
    .into_iter()
    .map(bookmark_from_row)
    .collect()
}

pub fn insert_bookmark(conn: &Connection, mark: &mut BookMark) -> RepoResult<()> {
    let id = insert_row(
        conn,
        EntityKind::BookMark,
        mark.folder_id,
        &mark.name,
        Some(&mark.feed_link),
        false,
    )?;
    mark.id = Some(id);
    Ok(())
}

pub fn insert_search_mark(
    conn: &Connection,
    mark: &mut SearchMark,
    added: &mut Vec<EntityRef>,
) -> RepoResult<()> {
    let id = insert_row(
        conn,
        EntityKind::SearchMark,
        mark.folder_id,
        &mark.name,
        None,
        mark.match_all_conditions,
    )?;
    mark.id = Some(id);
    for condition in &mut mark.conditions {
        condition.id = None;
    }
    search_repo::write_conditions(
        conn,
        ConditionOwner::SearchMark(id),
        &mut mark.conditions,
        added,
    )
}

pub fn insert_news_bin(conn: &Connection, bin: &mut NewsBin) -> RepoResult<()> {
    let id = insert_row(conn, EntityKind::NewsBin, bin.folder_id, &bin.name, None, false)?;
    bin.id = Some(id);
    Ok(())
}

pub fn update_bookmark(conn: &Connection, mark: &BookMark) -> RepoResult<bool> {
    let Some(id) = mark.id else {
        return Ok(false);
    };
    update_row(
        conn,
        EntityKind::BookMark,
        id,
        mark.folder_id,
        &mark.name,
        Some(&mark.feed_link),
        false,
    )
}

pub fn update_search_mark(
    conn: &Connection,
    mark: &mut SearchMark,
    added: &mut Vec<EntityRef>,
) -> RepoResult<bool> {
    let Some(id) = mark.id else {
        return Ok(false);
    };
    if !update_row(
        conn,
        EntityKind::SearchMark,
        id,
        mark.folder_id,
        &mark.name,
        None,
        mark.match_all_conditions,
    )? {
        return Ok(false);
    }
    search_repo::write_conditions(
        conn,
        ConditionOwner::SearchMark(id),
        &mut mark.conditions,
        added,
    )?;
    Ok(true)
}

pub fn update_news_bin(conn: &Connection, bin: &NewsBin) -> RepoResult<bool> {
    let Some(id) = bin.id else {
        return Ok(false);
    };
    update_row(conn, EntityKind::NewsBin, id, bin.folder_id, &bin.name, None, false)
}

fn load_row(conn: &Connection, kind: EntityKind, id: EntityId) -> RepoResult<Option<MarkRow>> {
    query_one(
        conn,
        &format!("{MARK_SELECT_SQL} WHERE id = ?1 AND kind = ?2;"),
        params![id, kind_name(kind)?],
        parse_mark_row,
    )
}

fn load_rows(conn: &Connection, kind: EntityKind) -> RepoResult<Vec<MarkRow>> {
    query_all(
        conn,
        &format!("{MARK_SELECT_SQL} WHERE kind = ?1 ORDER BY id ASC;"),
        [kind_name(kind)?],
        parse_mark_row,
    )
}

fn insert_row(
    conn: &Connection,
    kind: EntityKind,
    folder_id: EntityId,
    name: &str,
    feed_link: Option<&str>,
    match_all_conditions: bool,
) -> RepoResult<EntityId> {
    let position = next_child_position(conn, Some(folder_id))?;
    conn.execute(
        "INSERT INTO marks (
            kind,
            folder_id,
            name,
            position,
            feed_link,
            match_all_conditions
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            kind_name(kind)?,
            folder_id,
            name,
            position,
            feed_link,
            match_all_conditions
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn update_row(
    conn: &Connection,
    kind: EntityKind,
    id: EntityId,
    folder_id: EntityId,
    name: &str,
    feed_link: Option<&str>,
    match_all_conditions: bool,
) -> RepoResult<bool> {
    let current_folder: Option<EntityId> = conn
        .query_row(
            "SELECT folder_id FROM marks WHERE id = ?1 AND kind = ?2;",
            params![id, kind_name(kind)?],
            |row| row.get(0),
        )
        .optional()?;
    let Some(current_folder) = current_folder else {
        return Ok(false);
    };

    let position = if current_folder != folder_id {
        Some(next_child_position(conn, Some(folder_id))?)
    } else {
        None
    };
    let changed = conn.execute(
        "UPDATE marks
         SET
            folder_id = ?2,
            name = ?3,
            position = COALESCE(?4, position),
            feed_link = ?5,
            match_all_conditions = ?6,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![id, folder_id, name, position, feed_link, match_all_conditions],
    )?;
    Ok(changed > 0)
}

fn kind_name(kind: EntityKind) -> RepoResult<&'static str> {
    mark_kind_to_db(kind)
        .ok_or_else(|| RepoError::InvalidData(format!("{kind} is not stored in marks")))
}

fn parse_mark_row(row: &Row<'_>) -> RepoResult<MarkRow> {
    Ok(MarkRow {
        id: row.get("id")?,
        folder_id: row.get("folder_id")?,
        name: row.get("name")?,
        feed_link: row.get("feed_link")?,
        match_all_conditions: row.get("match_all_conditions")?,
    })
}

fn bookmark_from_row(row: MarkRow) -> RepoResult<BookMark> {
    let feed_link = row.feed_link.ok_or_else(|| {
        RepoError::InvalidData(format!("bookmark {} has no feed_link", row.id))
    })?;
    Ok(BookMark {
        id: Some(row.id),
        folder_id: row.folder_id,
        name: row.name,
        feed_link,
    })
}

fn search_mark_from_row(conn: &Connection, row: MarkRow) -> RepoResult<SearchMark> {
    let conditions = search_repo::load_conditions(conn, ConditionOwner::SearchMark(row.id))?;
    Ok(SearchMark {
        id: Some(row.id),
        folder_id: row.folder_id,
        name: row.name,
        match_all_conditions: row.match_all_conditions,
        conditions,
    })
}

fn news_bin_from_row(row: MarkRow) -> NewsBin {
    NewsBin {
        id: Some(row.id),
        folder_id: row.folder_id,
        name: row.name,
    }
}
