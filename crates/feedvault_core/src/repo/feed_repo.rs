//! Feed persistence keyed by unique link.

use crate::model::entity::EntityId;
use crate::model::feed::Feed;
use crate::repo::{query_all, query_one, RepoResult};
use rusqlite::{params, Connection, Row};

const FEED_SELECT_SQL: &str = "SELECT id, link, title, description FROM feeds";

pub fn load(conn: &Connection, id: EntityId) -> RepoResult<Option<Feed>> {
    query_one(
        conn,
        &format!("{FEED_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_feed_row,
    )
}

pub fn load_by_link(conn: &Connection, link: &str) -> RepoResult<Option<Feed>> {
    query_one(
        conn,
        &format!("{FEED_SELECT_SQL} WHERE link = ?1;"),
        [link],
        parse_feed_row,
    )
}

pub fn load_all(conn: &Connection) -> RepoResult<Vec<Feed>> {
    query_all(
        conn,
        &format!("{FEED_SELECT_SQL} ORDER BY id ASC;"),
        [],
        parse_feed_row,
    )
}

pub fn insert(conn: &Connection, feed: &mut Feed) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO feeds (link, title, description) VALUES (?1, ?2, ?3);",
        params![feed.link, feed.title, feed.description],
    )?;
    feed.id = Some(conn.last_insert_rowid());
    Ok(())
}

pub fn update(conn: &Connection, feed: &Feed) -> RepoResult<bool> {
    let Some(id) = feed.id else {
        return Ok(false);
    };
    let changed = conn.execute(
        "UPDATE feeds
         SET
            link = ?2,
            title = ?3,
            description = ?4,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![id, feed.link, feed.title, feed.description],
    )?;
    Ok(changed > 0)
}

fn parse_feed_row(row: &Row<'_>) -> RepoResult<Feed> {
    Ok(Feed {
        id: Some(row.get("id")?),
        link: row.get("link")?,
        title: row.get("title")?,
        description: row.get("description")?,
    })
}
