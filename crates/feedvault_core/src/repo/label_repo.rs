//! Label persistence and news-label links.

use crate::model::entity::EntityId;
use crate::model::label::Label;
use crate::repo::{query_all, query_ids, query_one, RepoResult};
use rusqlite::{params, Connection, Row};

const LABEL_SELECT_SQL: &str = "SELECT id, name, color, sort_order FROM labels";

pub fn load(conn: &Connection, id: EntityId) -> RepoResult<Option<Label>> {
    query_one(
        conn,
        &format!("{LABEL_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_label_row,
    )
}

pub fn load_all(conn: &Connection) -> RepoResult<Vec<Label>> {
    query_all(
        conn,
        &format!("{LABEL_SELECT_SQL} ORDER BY sort_order ASC, id ASC;"),
        [],
        parse_label_row,
    )
}

/// Labels linked to one news item.
pub fn labels_of_news(conn: &Connection, news_id: EntityId) -> RepoResult<Vec<Label>> {
    query_all(
        conn,
        "SELECT l.id, l.name, l.color, l.sort_order
         FROM labels l
         INNER JOIN news_labels nl ON nl.label_id = l.id
         WHERE nl.news_id = ?1
         ORDER BY l.sort_order ASC, l.id ASC;",
        [news_id],
        parse_label_row,
    )
}

/// Ids of news carrying `label_id`.
pub fn news_ids_with_label(conn: &Connection, label_id: EntityId) -> RepoResult<Vec<EntityId>> {
    query_ids(
        conn,
        "SELECT news_id FROM news_labels WHERE label_id = ?1 ORDER BY news_id ASC;",
        [label_id],
    )
}

/// Replaces the label links of one news item and returns the linked ids.
/// Unsaved labels and labels that no longer exist are skipped.
pub fn replace_news_labels(
    conn: &Connection,
    news_id: EntityId,
    labels: &[Label],
) -> RepoResult<Vec<EntityId>> {
    conn.execute("DELETE FROM news_labels WHERE news_id = ?1;", [news_id])?;
    let mut linked = Vec::with_capacity(labels.len());
    for label_id in labels.iter().filter_map(|label| label.id) {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO news_labels (news_id, label_id)
             SELECT ?1, id FROM labels WHERE id = ?2;",
            params![news_id, label_id],
        )?;
        if inserted > 0 {
            linked.push(label_id);
        }
    }
    Ok(linked)
}

pub fn insert(conn: &Connection, label: &mut Label) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO labels (name, color, sort_order) VALUES (?1, ?2, ?3);",
        params![label.name, label.color, label.order],
    )?;
    label.id = Some(conn.last_insert_rowid());
    Ok(())
}

pub fn update(conn: &Connection, label: &Label) -> RepoResult<bool> {
    let Some(id) = label.id else {
        return Ok(false);
    };
    let changed = conn.execute(
        "UPDATE labels SET name = ?2, color = ?3, sort_order = ?4 WHERE id = ?1;",
        params![id, label.name, label.color, label.order],
    )?;
    Ok(changed > 0)
}

fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    Ok(Label {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        color: row.get("color")?,
        order: row.get("sort_order")?,
    })
}
