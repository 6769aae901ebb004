//! Entity identity, type tags and the type-erased entity envelope.
//!
//! # Responsibility
//! - Define the stable identity (`EntityId`) and kind tag of every entity.
//! - Provide identity-based equality for all persisted entity types.
//! - Provide `AnyEntity`, the envelope carried by change events.
//!
//! # Invariants
//! - Ids are assigned by storage on first save, never by callers.
//! - Two saved entities are equal iff their ids are equal.
//! - Two entities where at least one is unsaved are equal only when they are
//!   the same object in memory.

use crate::model::feed::Feed;
use crate::model::filter::{FilterAction, SearchFilter};
use crate::model::folder::{BookMark, Folder, NewsBin, SearchMark};
use crate::model::label::Label;
use crate::model::news::{Attachment, Category, News, Person};
use crate::model::search::{Search, SearchCondition};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Storage-assigned identity. Unique per entity kind.
pub type EntityId = i64;

/// Type tag for every persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    BookMark,
    SearchMark,
    NewsBin,
    Feed,
    News,
    Category,
    Person,
    Attachment,
    Label,
    Search,
    SearchCondition,
    SearchFilter,
    FilterAction,
}

impl EntityKind {
    /// Every kind, in event dispatch order.
    pub const ALL: [EntityKind; 14] = [
        Self::Folder,
        Self::BookMark,
        Self::SearchMark,
        Self::NewsBin,
        Self::Feed,
        Self::News,
        Self::Category,
        Self::Person,
        Self::Attachment,
        Self::Label,
        Self::Search,
        Self::SearchCondition,
        Self::SearchFilter,
        Self::FilterAction,
    ];

    /// Stable snake_case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::BookMark => "bookmark",
            Self::SearchMark => "search_mark",
            Self::NewsBin => "news_bin",
            Self::Feed => "feed",
            Self::News => "news",
            Self::Category => "category",
            Self::Person => "person",
            Self::Attachment => "attachment",
            Self::Label => "label",
            Self::Search => "search",
            Self::SearchCondition => "search_condition",
            Self::SearchFilter => "search_filter",
            Self::FilterAction => "filter_action",
        }
    }

    /// Returns whether this kind lives inside a folder as a mark.
    pub fn is_mark(self) -> bool {
        matches!(self, Self::BookMark | Self::SearchMark | Self::NewsBin)
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one persisted entity by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Common contract of every entity type.
pub trait Entity: Clone + Debug + Into<AnyEntity> {
    /// Kind tag of this type.
    const KIND: EntityKind;

    /// Storage identity. `None` until the first successful save.
    fn id(&self) -> Option<EntityId>;

    /// Returns the storage reference for saved entities.
    fn entity_ref(&self) -> Option<EntityRef> {
        self.id().map(|id| EntityRef::new(Self::KIND, id))
    }
}

macro_rules! entity_types {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$ty;

                fn id(&self) -> Option<EntityId> {
                    self.id
                }
            }

            impl PartialEq for $ty {
                fn eq(&self, other: &Self) -> bool {
                    match (self.id, other.id) {
                        (Some(left), Some(right)) => left == right,
                        _ => std::ptr::eq(self, other),
                    }
                }
            }

            impl Eq for $ty {}

            impl std::hash::Hash for $ty {
                fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                    self.id.hash(state);
                }
            }

            impl From<$ty> for AnyEntity {
                fn from(value: $ty) -> Self {
                    Self::$ty(value)
                }
            }

            impl TryFrom<AnyEntity> for $ty {
                type Error = AnyEntity;

                fn try_from(value: AnyEntity) -> Result<Self, AnyEntity> {
                    match value {
                        AnyEntity::$ty(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+

        /// Type-erased entity snapshot, as carried by change events.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum AnyEntity {
            $($ty($ty)),+
        }

        impl AnyEntity {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Self::$ty(_) => EntityKind::$ty),+
                }
            }

            pub fn id(&self) -> Option<EntityId> {
                match self {
                    $(Self::$ty(inner) => inner.id),+
                }
            }
        }
    };
}

entity_types!(
    Folder,
    BookMark,
    SearchMark,
    NewsBin,
    Feed,
    News,
    Category,
    Person,
    Attachment,
    Label,
    Search,
    SearchCondition,
    SearchFilter,
    FilterAction,
);

impl AnyEntity {
    /// Returns the storage reference for saved snapshots.
    pub fn entity_ref(&self) -> Option<EntityRef> {
        self.id().map(|id| EntityRef::new(self.kind(), id))
    }

    pub fn as_news(&self) -> Option<&News> {
        match self {
            Self::News(news) => Some(news),
            _ => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Self::Folder(folder) => Some(folder),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AnyEntity, Entity, EntityKind};
    use crate::model::folder::Folder;
    use crate::model::news::News;
    use std::collections::HashSet;

    #[test]
    fn unsaved_entities_with_equal_fields_are_not_equal() {
        let left = Folder::new(None, "Root");
        let right = Folder::new(None, "Root");
        assert_ne!(left, right);
        assert_eq!(left, left);
    }

    #[test]
    fn saved_entities_compare_by_id() {
        let mut left = News::new("https://example.com/feed.xml");
        let mut right = News::new("https://example.com/other.xml");
        left.id = Some(7);
        right.id = Some(7);
        assert_eq!(left, right);

        let mut set = HashSet::new();
        set.insert(left);
        assert!(set.contains(&right));
    }

    #[test]
    fn any_entity_round_trips_typed_value() {
        let mut folder = Folder::new(None, "Root");
        folder.id = Some(3);
        let any: AnyEntity = folder.into();
        assert_eq!(any.kind(), EntityKind::Folder);
        assert_eq!(any.entity_ref().map(|r| r.id), Some(3));

        let typed = Folder::try_from(any).expect("folder variant");
        assert_eq!(typed.id(), Some(3));
    }
}
