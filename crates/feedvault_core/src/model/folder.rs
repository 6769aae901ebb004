//! Folder tree model: folders and the marks they contain.
//!
//! # Responsibility
//! - Define `Folder` and the three mark variants (`BookMark`, `SearchMark`,
//!   `NewsBin`).
//! - Provide `FolderChild`, the ordered child view of one folder.
//!
//! # Invariants
//! - A folder owns its child folders and marks exclusively.
//! - A bookmark points at its feed by link key, never by id.
//! - A search mark owns its conditions exclusively.

use crate::model::entity::{AnyEntity, EntityId, EntityKind, EntityRef};
use crate::model::search::SearchCondition;

/// Grouping node of the subscription tree.
#[derive(Debug, Clone)]
pub struct Folder {
    pub(crate) id: Option<EntityId>,
    /// Parent folder id. `None` for root folders.
    pub parent_id: Option<EntityId>,
    pub name: String,
}

impl Folder {
    pub fn new(parent_id: Option<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            parent_id,
            name: name.into(),
        }
    }
}

/// Subscription entry referencing a feed by its link.
#[derive(Debug, Clone)]
pub struct BookMark {
    pub(crate) id: Option<EntityId>,
    pub folder_id: EntityId,
    pub name: String,
    /// Link key of the referenced feed.
    pub feed_link: String,
}

impl BookMark {
    pub fn new(folder_id: EntityId, name: impl Into<String>, feed_link: impl Into<String>) -> Self {
        Self {
            id: None,
            folder_id,
            name: name.into(),
            feed_link: feed_link.into(),
        }
    }
}

/// Saved search living in the folder tree.
#[derive(Debug, Clone)]
pub struct SearchMark {
    pub(crate) id: Option<EntityId>,
    pub folder_id: EntityId,
    pub name: String,
    /// `true` requires every condition to match, `false` any.
    pub match_all_conditions: bool,
    pub conditions: Vec<SearchCondition>,
}

impl SearchMark {
    pub fn new(folder_id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id: None,
            folder_id,
            name: name.into(),
            match_all_conditions: false,
            conditions: Vec::new(),
        }
    }

    pub fn add_condition(&mut self, condition: SearchCondition) {
        self.conditions.push(condition);
    }
}

/// Container holding copied or moved news.
#[derive(Debug, Clone)]
pub struct NewsBin {
    pub(crate) id: Option<EntityId>,
    pub folder_id: EntityId,
    pub name: String,
}

impl NewsBin {
    pub fn new(folder_id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id: None,
            folder_id,
            name: name.into(),
        }
    }
}

/// One ordered child of a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderChild {
    Folder(Folder),
    BookMark(BookMark),
    SearchMark(SearchMark),
    NewsBin(NewsBin),
}

impl FolderChild {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Folder(_) => EntityKind::Folder,
            Self::BookMark(_) => EntityKind::BookMark,
            Self::SearchMark(_) => EntityKind::SearchMark,
            Self::NewsBin(_) => EntityKind::NewsBin,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::BookMark(mark) => &mark.name,
            Self::SearchMark(mark) => &mark.name,
            Self::NewsBin(bin) => &bin.name,
        }
    }

    pub fn entity_ref(&self) -> Option<EntityRef> {
        let id = match self {
            Self::Folder(folder) => folder.id,
            Self::BookMark(mark) => mark.id,
            Self::SearchMark(mark) => mark.id,
            Self::NewsBin(bin) => bin.id,
        };
        id.map(|id| EntityRef::new(self.kind(), id))
    }
}

impl From<FolderChild> for AnyEntity {
    fn from(value: FolderChild) -> Self {
        match value {
            FolderChild::Folder(folder) => folder.into(),
            FolderChild::BookMark(mark) => mark.into(),
            FolderChild::SearchMark(mark) => mark.into(),
            FolderChild::NewsBin(bin) => bin.into(),
        }
    }
}
