//! Folder persistence and ordered child listing.
//!
//! # Invariants
//! - Folders and marks share one position sequence per parent folder.
//! - A folder moved to another parent is appended at the end.

use crate::model::entity::{EntityId, EntityKind};
use crate::model::folder::{Folder, FolderChild};
use crate::repo::{mark_repo, parse_mark_kind, query_all, query_one, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const FOLDER_SELECT_SQL: &str = "SELECT id, parent_id, name FROM folders";

pub fn load(conn: &Connection, id: EntityId) -> RepoResult<Option<Folder>> {
    query_one(
        conn,
        &format!("{FOLDER_SELECT_SQL} WHERE id = ?1;"),
        [id],
        parse_folder_row,
    )
}

pub fn load_all(conn: &Connection) -> RepoResult<Vec<Folder>> {
    query_all(
        conn,
        &format!("{FOLDER_SELECT_SQL} ORDER BY id ASC;"),
        [],
        parse_folder_row,
    )
}

/// Folders without a parent, in position order.
pub fn roots(conn: &Connection) -> RepoResult<Vec<Folder>> {
    query_all(
        conn,
        &format!("{FOLDER_SELECT_SQL} WHERE parent_id IS NULL ORDER BY position ASC, id ASC;"),
        [],
        parse_folder_row,
    )
}

pub fn insert(conn: &Connection, folder: &mut Folder) -> RepoResult<()> {
    let position = next_child_position(conn, folder.parent_id)?;
    conn.execute(
        "INSERT INTO folders (parent_id, name, position) VALUES (?1, ?2, ?3);",
        params![folder.parent_id, folder.name, position],
    )?;
    folder.id = Some(conn.last_insert_rowid());
    Ok(())
}

/// Writes scalar fields. Returns `false` when the row no longer exists.
pub fn update(conn: &Connection, folder: &Folder) -> RepoResult<bool> {
    let Some(id) = folder.id else {
        return Ok(false);
    };
    let current_parent: Option<Option<EntityId>> = conn
        .query_row(
            "SELECT parent_id FROM folders WHERE id = ?1;",
            [id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(current_parent) = current_parent else {
        return Ok(false);
    };

    let position = if current_parent != folder.parent_id {
        Some(next_child_position(conn, folder.parent_id)?)
    } else {
        None
    };
    let changed = conn.execute(
        "UPDATE folders
         SET
            parent_id = ?2,
            name = ?3,
            position = COALESCE(?4, position),
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?1;",
        params![id, folder.parent_id, folder.name, position],
    )?;
    Ok(changed > 0)
}

/// Child folders and marks of `folder_id`, in position order.
pub fn children(conn: &Connection, folder_id: EntityId) -> RepoResult<Vec<FolderChild>> {
    let entries = query_all(
        conn,
        "SELECT 'folder' AS kind, id, position FROM folders WHERE parent_id = ?1
         UNION ALL
         SELECT kind, id, position FROM marks WHERE folder_id = ?1
         ORDER BY position ASC, id ASC;",
        [folder_id],
        |row| {
            let kind: String = row.get("kind")?;
            let id: EntityId = row.get("id")?;
            Ok((kind, id))
        },
    )?;

    let mut children = Vec::with_capacity(entries.len());
    for (kind, id) in entries {
        let child = if kind == "folder" {
            load(conn, id)?.map(FolderChild::Folder)
        } else {
            match parse_mark_kind(&kind) {
                Some(EntityKind::BookMark) => {
                    mark_repo::load_bookmark(conn, id)?.map(FolderChild::BookMark)
                }
                Some(EntityKind::SearchMark) => {
                    mark_repo::load_search_mark(conn, id)?.map(FolderChild::SearchMark)
                }
                Some(EntityKind::NewsBin) => {
                    mark_repo::load_news_bin(conn, id)?.map(FolderChild::NewsBin)
                }
                _ => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid mark kind `{kind}` in marks.kind"
                    )))
                }
            }
        };
        children.extend(child);
    }
    Ok(children)
}

/// Next free position among the children of `parent_id`.
pub(crate) fn next_child_position(
    conn: &Connection,
    parent_id: Option<EntityId>,
) -> RepoResult<i64> {
    let position = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM (
            SELECT position FROM folders WHERE parent_id IS ?1
            UNION ALL
            SELECT position FROM marks WHERE folder_id = ?1
         );",
        [parent_id],
        |row| row.get(0),
    )?;
    Ok(position)
}

fn parse_folder_row(row: &Row<'_>) -> RepoResult<Folder> {
    Ok(Folder {
        id: Some(row.get("id")?),
        parent_id: row.get("parent_id")?,
        name: row.get("name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{children, insert, load, roots, update};
    use crate::db::open_db_in_memory;
    use crate::model::folder::{BookMark, Folder, FolderChild};
    use crate::repo::mark_repo;

    #[test]
    fn children_interleave_folders_and_marks_by_insertion() {
        let conn = open_db_in_memory().unwrap();
        let mut root = Folder::new(None, "Root");
        insert(&conn, &mut root).unwrap();
        let root_id = root.id.unwrap();

        let mut sub = Folder::new(Some(root_id), "Sub");
        insert(&conn, &mut sub).unwrap();
        let mut mark = BookMark::new(root_id, "Blog", "https://example.com/feed.xml");
        mark_repo::insert_bookmark(&conn, &mut mark).unwrap();
        let mut last = Folder::new(Some(root_id), "Last");
        insert(&conn, &mut last).unwrap();

        let names: Vec<String> = children(&conn, root_id)
            .unwrap()
            .iter()
            .map(|child| child.name().to_string())
            .collect();
        assert_eq!(names, vec!["Sub", "Blog", "Last"]);
        assert!(matches!(children(&conn, root_id).unwrap()[1], FolderChild::BookMark(_)));
        assert_eq!(roots(&conn).unwrap().len(), 1);
    }

    #[test]
    fn moving_folder_appends_it_to_new_parent() {
        let conn = open_db_in_memory().unwrap();
        let mut a = Folder::new(None, "A");
        let mut b = Folder::new(None, "B");
        insert(&conn, &mut a).unwrap();
        insert(&conn, &mut b).unwrap();
        let mut child = Folder::new(a.id, "Child");
        insert(&conn, &mut child).unwrap();
        let mut existing = Folder::new(b.id, "Existing");
        insert(&conn, &mut existing).unwrap();

        child.parent_id = b.id;
        assert!(update(&conn, &child).unwrap());
        let names: Vec<String> = children(&conn, b.id.unwrap())
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["Existing", "Child"]);
        assert_eq!(load(&conn, child.id.unwrap()).unwrap().unwrap().parent_id, b.id);
    }

    #[test]
    fn update_of_missing_row_reports_false() {
        let conn = open_db_in_memory().unwrap();
        let mut ghost = Folder::new(None, "Ghost");
        ghost.id = Some(99);
        assert!(!update(&conn, &ghost).unwrap());
    }
}
