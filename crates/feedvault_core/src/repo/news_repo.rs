//! News persistence with categories, author, attachments and label links.
//!
//! # Responsibility
//! - Load news together with every nested collection.
//! - Write nested collections in list order, assigning ids to new rows.
//! - Propagate read/unread state across news sharing one link.
//!
//! # Invariants
//! - `bin_id IS NULL` means the news lives in the feed named by `feed_link`.
//! - Propagation never touches HIDDEN or DELETED siblings.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::news::{Attachment, Category, News, NewsState, Person};
use crate::repo::{label_repo, query_all, query_ids, query_one, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const NEWS_SELECT_SQL: &str = "SELECT
    id,
    feed_link,
    bin_id,
    title,
    link,
    guid,
    description,
    publish_date,
    received_date,
    state,
    is_sticky
FROM news";

const CATEGORY_SELECT_SQL: &str = "SELECT id, name, domain FROM categories";
const PERSON_SELECT_SQL: &str = "SELECT id, name, email, uri FROM persons";
const ATTACHMENT_SELECT_SQL: &str = "SELECT id, link, mime_type, length FROM attachments";

pub fn load(conn: &Connection, id: EntityId) -> RepoResult<Option<News>> {
    let news = query_one(
        conn,
        &format!("{NEWS_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_news_row,
    )?;
    match news {
        Some(news) => Ok(Some(with_nested(conn, news)?)),
        None => Ok(None),
    }
}

pub fn load_all(conn: &Connection) -> RepoResult<Vec<News>> {
    load_where(conn, "1 = 1", [])
}

/// News living in the feed with `feed_link` (not in any bin).
pub fn of_feed(conn: &Connection, feed_link: &str) -> RepoResult<Vec<News>> {
    load_where(conn, "feed_link = ?1 AND bin_id IS NULL", [feed_link])
}

pub fn of_bin(conn: &Connection, bin_id: EntityId) -> RepoResult<Vec<News>> {
    load_where(conn, "bin_id = ?1", [bin_id])
}

/// Every news whose article link equals `link`, across feeds and bins.
pub fn by_link(conn: &Connection, link: &str) -> RepoResult<Vec<News>> {
    load_where(conn, "link = ?1", [link])
}

pub fn insert(conn: &Connection, news: &mut News, added: &mut Vec<EntityRef>) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO news (
            feed_link,
            bin_id,
            title,
            link,
            guid,
            description,
            publish_date,
            received_date,
            state,
            is_sticky
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            news.feed_link,
            news.bin_id,
            news.title,
            news.link,
            news.guid,
            news.description,
            news.publish_date,
            news.received_date,
            news.state.as_str(),
            news.sticky
        ],
    )?;
    let id = conn.last_insert_rowid();
    news.id = Some(id);

    for category in &mut news.categories {
        category.id = None;
    }
    for attachment in &mut news.attachments {
        attachment.id = None;
    }
    if let Some(author) = news.author.as_mut() {
        author.id = None;
    }
    write_nested(conn, id, news, added)
}

/// Writes scalar fields and nested collections.
///
/// Returns `false` when the row no longer exists. Nested rows removed by a
/// merge must already be deleted.
pub fn update(conn: &Connection, news: &mut News, added: &mut Vec<EntityRef>) -> RepoResult<bool> {
    let Some(id) = news.id else {
        return Ok(false);
    };
    let changed = conn.execute(
        "UPDATE news
         SET
            feed_link = ?2,
            bin_id = ?3,
            title = ?4,
            link = ?5,
            guid = ?6,
            description = ?7,
            publish_date = ?8,
            received_date = ?9,
            state = ?10,
            is_sticky = ?11,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![
            id,
            news.feed_link,
            news.bin_id,
            news.title,
            news.link,
            news.guid,
            news.description,
            news.publish_date,
            news.received_date,
            news.state.as_str(),
            news.sticky
        ],
    )?;
    if changed == 0 {
        return Ok(false);
    }
    write_nested(conn, id, news, added)?;
    Ok(true)
}

/// Applies `state` to every visible news sharing `link`, except `except_id`.
///
/// Returns the ids whose state actually changed.
pub fn propagate_state(
    conn: &Connection,
    link: &str,
    except_id: EntityId,
    state: NewsState,
) -> RepoResult<Vec<EntityId>> {
    let ids = query_ids(
        conn,
        "SELECT id FROM news
         WHERE link = ?1
           AND id <> ?2
           AND state <> ?3
           AND state NOT IN ('hidden', 'deleted')
         ORDER BY id ASC;",
        params![link, except_id, state.as_str()],
    )?;
    for id in &ids {
        conn.execute(
            "UPDATE news
             SET state = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, state.as_str()],
        )?;
    }
    Ok(ids)
}

pub fn load_category(conn: &Connection, id: EntityId) -> RepoResult<Option<Category>> {
    query_one(
        conn,
        &format!("{CATEGORY_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_category_row,
    )
}

pub fn load_person(conn: &Connection, id: EntityId) -> RepoResult<Option<Person>> {
    query_one(
        conn,
        &format!("{PERSON_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_person_row,
    )
}

pub fn load_attachment(conn: &Connection, id: EntityId) -> RepoResult<Option<Attachment>> {
    query_one(
        conn,
        &format!("{ATTACHMENT_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_attachment_row,
    )
}

fn load_where<P: rusqlite::Params>(
    conn: &Connection,
    clause: &str,
    params: P,
) -> RepoResult<Vec<News>> {
    let rows = query_all(
        conn,
        &format!("{NEWS_SELECT_SQL} WHERE {clause} ORDER BY id ASC;"),
        params,
        parse_news_row,
    )?;
    rows.into_iter().map(|news| with_nested(conn, news)).collect()
}

fn with_nested(conn: &Connection, mut news: News) -> RepoResult<News> {
    let Some(id) = news.id else {
        return Ok(news);
    };
    news.categories = query_all(
        conn,
        &format!("{CATEGORY_SELECT_SQL} WHERE news_id = ?1 ORDER BY position ASC, id ASC;"),
        [id],
        parse_category_row,
    )?;
    news.attachments = query_all(
        conn,
        &format!("{ATTACHMENT_SELECT_SQL} WHERE news_id = ?1 ORDER BY position ASC, id ASC;"),
        [id],
        parse_attachment_row,
    )?;
    news.author = query_one(
        conn,
        &format!("{PERSON_SELECT_SQL} WHERE news_id = ?1;"),
        [id],
        parse_person_row,
    )?;
    news.labels = label_repo::labels_of_news(conn, id)?;
    Ok(news)
}

fn write_nested(
    conn: &Connection,
    news_id: EntityId,
    news: &mut News,
    added: &mut Vec<EntityRef>,
) -> RepoResult<()> {
    for (position, category) in news.categories.iter_mut().enumerate() {
        let position = position as i64;
        match category.id {
            Some(id) => {
                conn.execute(
                    "UPDATE categories SET name = ?2, domain = ?3, position = ?4 WHERE id = ?1;",
                    params![id, category.name, category.domain, position],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO categories (news_id, name, domain, position)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![news_id, category.name, category.domain, position],
                )?;
                let id = conn.last_insert_rowid();
                category.id = Some(id);
                added.push(EntityRef::new(EntityKind::Category, id));
            }
        }
    }

    for (position, attachment) in news.attachments.iter_mut().enumerate() {
        let position = position as i64;
        match attachment.id {
            Some(id) => {
                conn.execute(
                    "UPDATE attachments
                     SET link = ?2, mime_type = ?3, length = ?4, position = ?5
                     WHERE id = ?1;",
                    params![
                        id,
                        attachment.link,
                        attachment.mime_type,
                        attachment.length,
                        position
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO attachments (news_id, link, mime_type, length, position)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        news_id,
                        attachment.link,
                        attachment.mime_type,
                        attachment.length,
                        position
                    ],
                )?;
                let id = conn.last_insert_rowid();
                attachment.id = Some(id);
                added.push(EntityRef::new(EntityKind::Attachment, id));
            }
        }
    }

    if let Some(author) = news.author.as_mut() {
        match author.id {
            Some(id) => {
                conn.execute(
                    "UPDATE persons SET name = ?2, email = ?3, uri = ?4 WHERE id = ?1;",
                    params![id, author.name, author.email, author.uri],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO persons (news_id, name, email, uri) VALUES (?1, ?2, ?3, ?4);",
                    params![news_id, author.name, author.email, author.uri],
                )?;
                let id = conn.last_insert_rowid();
                author.id = Some(id);
                added.push(EntityRef::new(EntityKind::Person, id));
            }
        }
    }

    let linked = label_repo::replace_news_labels(conn, news_id, &news.labels)?;
    news.labels.retain(|label| label.id.is_some_and(|id| linked.contains(&id)));
    Ok(())
}

fn parse_news_row(row: &Row<'_>) -> RepoResult<News> {
    let state_text: String = row.get("state")?;
    let state = NewsState::parse(&state_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid news state `{state_text}` in news.state"))
    })?;

    Ok(News {
        id: Some(row.get("id")?),
        feed_link: row.get("feed_link")?,
        bin_id: row.get("bin_id")?,
        title: row.get("title")?,
        link: row.get("link")?,
        guid: row.get("guid")?,
        description: row.get("description")?,
        publish_date: row.get("publish_date")?,
        received_date: row.get("received_date")?,
        state,
        sticky: row.get("is_sticky")?,
        labels: Vec::new(),
        categories: Vec::new(),
        author: None,
        attachments: Vec::new(),
    })
}

fn parse_category_row(row: &Row<'_>) -> RepoResult<Category> {
    Ok(Category {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        domain: row.get("domain")?,
    })
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    Ok(Person {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        email: row.get("email")?,
        uri: row.get("uri")?,
    })
}

fn parse_attachment_row(row: &Row<'_>) -> RepoResult<Attachment> {
    Ok(Attachment {
        id: Some(row.get("id")?),
        link: row.get("link")?,
        mime_type: row.get("mime_type")?,
        length: row.get("length")?,
    })
}
