//! Search-condition persistence.
//!
//! # Responsibility
//! - Store conditions owned either by a search mark or by a filter search.
//! - Serialize condition values as tagged JSON.
//!
//! # Invariants
//! - Exactly one owner column is set per row.
//! - `position` mirrors the index of the condition in its owner's list.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::search::{SearchCondition, SearchField, SearchSpecifier, SearchValue};
use crate::repo::{query_all, query_one, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const CONDITION_SELECT_SQL: &str =
    "SELECT id, field, specifier, value FROM search_conditions";

/// Owner of a condition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOwner {
    SearchMark(EntityId),
    Search(EntityId),
}

impl ConditionOwner {
    fn column(self) -> &'static str {
        match self {
            Self::SearchMark(_) => "search_mark_id",
            Self::Search(_) => "search_id",
        }
    }

    fn id(self) -> EntityId {
        match self {
            Self::SearchMark(id) | Self::Search(id) => id,
        }
    }
}

pub fn load_conditions(
    conn: &Connection,
    owner: ConditionOwner,
) -> RepoResult<Vec<SearchCondition>> {
    query_all(
        conn,
        &format!(
            "{CONDITION_SELECT_SQL} WHERE {} = ?1 ORDER BY position ASC, id ASC;",
            owner.column()
        ),
        [owner.id()],
        parse_condition_row,
    )
}

pub fn load_condition(conn: &Connection, id: EntityId) -> RepoResult<Option<SearchCondition>> {
    query_one(
        conn,
        &format!("{CONDITION_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_condition_row,
    )
}

/// Writes `conditions` for `owner`: rows with ids are updated in place,
/// rows without ids are inserted and receive their new id.
///
/// Removed conditions are deleted by the caller beforehand.
pub fn write_conditions(
    conn: &Connection,
    owner: ConditionOwner,
    conditions: &mut [SearchCondition],
    added: &mut Vec<EntityRef>,
) -> RepoResult<()> {
    let (search_mark_id, search_id) = match owner {
        ConditionOwner::SearchMark(id) => (Some(id), None),
        ConditionOwner::Search(id) => (None, Some(id)),
    };

    for (position, condition) in conditions.iter_mut().enumerate() {
        let value = serde_json::to_string(&condition.value)?;
        let position = position as i64;
        match condition.id {
            Some(id) => {
                conn.execute(
                    "UPDATE search_conditions
                     SET position = ?2, field = ?3, specifier = ?4, value = ?5
                     WHERE id = ?1;",
                    params![
                        id,
                        position,
                        condition.field.as_str(),
                        condition.specifier.as_str(),
                        value
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO search_conditions (
                        search_mark_id,
                        search_id,
                        position,
                        field,
                        specifier,
                        value
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                    params![
                        search_mark_id,
                        search_id,
                        position,
                        condition.field.as_str(),
                        condition.specifier.as_str(),
                        value
                    ],
                )?;
                let id = conn.last_insert_rowid();
                condition.id = Some(id);
                added.push(EntityRef::new(EntityKind::SearchCondition, id));
            }
        }
    }
    Ok(())
}

fn parse_condition_row(row: &Row<'_>) -> RepoResult<SearchCondition> {
    let field_text: String = row.get("field")?;
    let field = SearchField::parse(&field_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid field `{field_text}` in search_conditions.field"
        ))
    })?;
    let specifier_text: String = row.get("specifier")?;
    let specifier = SearchSpecifier::parse(&specifier_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid specifier `{specifier_text}` in search_conditions.specifier"
        ))
    })?;
    let value_text: String = row.get("value")?;
    let value: SearchValue = serde_json::from_str(&value_text)?;

    Ok(SearchCondition {
        id: Some(row.get("id")?),
        field,
        specifier,
        value,
    })
}
