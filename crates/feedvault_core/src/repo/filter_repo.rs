//! Search-filter persistence with its search and ordered actions.
//!
//! # Invariants
//! - A filter owns at most one search row.
//! - Filters load in ascending `sort_order`, ties broken by id.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::filter::{FilterAction, SearchFilter};
use crate::model::search::Search;
use crate::repo::search_repo::{self, ConditionOwner};
use crate::repo::{query_all, query_one, RepoResult};
use rusqlite::{params, Connection, Row};
use serde_json::Value;

const FILTER_SELECT_SQL: &str =
    "SELECT id, name, sort_order, is_enabled, match_all_news FROM search_filters";
const SEARCH_SELECT_SQL: &str = "SELECT id, match_all_conditions FROM searches";
const ACTION_SELECT_SQL: &str = "SELECT id, action_id, data FROM filter_actions";

pub fn load(conn: &Connection, id: EntityId) -> RepoResult<Option<SearchFilter>> {
    let filter = query_one(
        conn,
        &format!("{FILTER_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_filter_row,
    )?;
    match filter {
        Some(filter) => Ok(Some(with_nested(conn, filter)?)),
        None => Ok(None),
    }
}

pub fn load_all(conn: &Connection) -> RepoResult<Vec<SearchFilter>> {
    query_all(
        conn,
        &format!("{FILTER_SELECT_SQL} ORDER BY sort_order ASC, id ASC;"),
        [],
        parse_filter_row,
    )?
    .into_iter()
    .map(|filter| with_nested(conn, filter))
    .collect()
}

/// Enabled filters in evaluation order.
pub fn load_enabled(conn: &Connection) -> RepoResult<Vec<SearchFilter>> {
    query_all(
        conn,
        &format!("{FILTER_SELECT_SQL} WHERE is_enabled = 1 ORDER BY sort_order ASC, id ASC;"),
        [],
        parse_filter_row,
    )?
    .into_iter()
    .map(|filter| with_nested(conn, filter))
    .collect()
}

pub fn load_search(conn: &Connection, id: EntityId) -> RepoResult<Option<Search>> {
    let search = query_one(
        conn,
        &format!("{SEARCH_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_search_row,
    )?;
    match search {
        Some(mut search) => {
            search.conditions = search_repo::load_conditions(conn, ConditionOwner::Search(id))?;
            Ok(Some(search))
        }
        None => Ok(None),
    }
}

pub fn load_action(conn: &Connection, id: EntityId) -> RepoResult<Option<FilterAction>> {
    query_one(
        conn,
        &format!("{ACTION_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_action_row,
    )
}

pub fn insert(
    conn: &Connection,
    filter: &mut SearchFilter,
    added: &mut Vec<EntityRef>,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO search_filters (name, sort_order, is_enabled, match_all_news)
         VALUES (?1, ?2, ?3, ?4);",
        params![filter.name, filter.order, filter.enabled, filter.match_all_news],
    )?;
    let id = conn.last_insert_rowid();
    filter.id = Some(id);

    if let Some(search) = filter.search.as_mut() {
        search.id = None;
        for condition in &mut search.conditions {
            condition.id = None;
        }
    }
    for action in &mut filter.actions {
        action.id = None;
    }
    write_nested(conn, id, filter, added)
}

/// Returns `false` when the row no longer exists. Nested rows removed by a
/// merge must already be deleted.
pub fn update(
    conn: &Connection,
    filter: &mut SearchFilter,
    added: &mut Vec<EntityRef>,
) -> RepoResult<bool> {
    let Some(id) = filter.id else {
        return Ok(false);
    };
    let changed = conn.execute(
        "UPDATE search_filters
         SET name = ?2, sort_order = ?3, is_enabled = ?4, match_all_news = ?5
         WHERE id = ?1;",
        params![
            id,
            filter.name,
            filter.order,
            filter.enabled,
            filter.match_all_news
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    write_nested(conn, id, filter, added)?;
    Ok(true)
}

fn with_nested(conn: &Connection, mut filter: SearchFilter) -> RepoResult<SearchFilter> {
    let Some(id) = filter.id else {
        return Ok(filter);
    };
    let search_id: Option<EntityId> = query_one(
        conn,
        "SELECT id FROM searches WHERE filter_id = ?1;",
        [id],
        |row| Ok(row.get(0)?),
    )?;
    filter.search = match search_id {
        Some(search_id) => load_search(conn, search_id)?,
        None => None,
    };
    filter.actions = query_all(
        conn,
        &format!("{ACTION_SELECT_SQL} WHERE filter_id = ?1 ORDER BY position ASC, id ASC;"),
        [id],
        parse_action_row,
    )?;
    Ok(filter)
}

fn write_nested(
    conn: &Connection,
    filter_id: EntityId,
    filter: &mut SearchFilter,
    added: &mut Vec<EntityRef>,
) -> RepoResult<()> {
    if let Some(search) = filter.search.as_mut() {
        let search_id = match search.id {
            Some(search_id) => {
                conn.execute(
                    "UPDATE searches SET match_all_conditions = ?2 WHERE id = ?1;",
                    params![search_id, search.match_all_conditions],
                )?;
                search_id
            }
            None => {
                conn.execute(
                    "INSERT INTO searches (filter_id, match_all_conditions) VALUES (?1, ?2);",
                    params![filter_id, search.match_all_conditions],
                )?;
                let search_id = conn.last_insert_rowid();
                search.id = Some(search_id);
                added.push(EntityRef::new(EntityKind::Search, search_id));
                search_id
            }
        };
        search_repo::write_conditions(
            conn,
            ConditionOwner::Search(search_id),
            &mut search.conditions,
            added,
        )?;
    }

    for (position, action) in filter.actions.iter_mut().enumerate() {
        let position = position as i64;
        let data = action.data.as_ref().map(Value::to_string);
        match action.id {
            Some(id) => {
                conn.execute(
                    "UPDATE filter_actions SET position = ?2, action_id = ?3, data = ?4
                     WHERE id = ?1;",
                    params![id, position, action.action_id, data],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO filter_actions (filter_id, position, action_id, data)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![filter_id, position, action.action_id, data],
                )?;
                let id = conn.last_insert_rowid();
                action.id = Some(id);
                added.push(EntityRef::new(EntityKind::FilterAction, id));
            }
        }
    }
    Ok(())
}

fn parse_filter_row(row: &Row<'_>) -> RepoResult<SearchFilter> {
    Ok(SearchFilter {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        order: row.get("sort_order")?,
        enabled: row.get("is_enabled")?,
        match_all_news: row.get("match_all_news")?,
        search: None,
        actions: Vec::new(),
    })
}

fn parse_search_row(row: &Row<'_>) -> RepoResult<Search> {
    Ok(Search {
        id: Some(row.get("id")?),
        match_all_conditions: row.get("match_all_conditions")?,
        conditions: Vec::new(),
    })
}

fn parse_action_row(row: &Row<'_>) -> RepoResult<FilterAction> {
    let data_text: Option<String> = row.get("data")?;
    let data = match data_text {
        Some(text) => Some(serde_json::from_str::<Value>(&text)?),
        None => None,
    };
    Ok(FilterAction {
        id: Some(row.get("id")?),
        action_id: row.get("action_id")?,
        data,
    })
}
