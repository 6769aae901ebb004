//! News model and its exclusively owned sub-entities.
//!
//! # Responsibility
//! - Define `News`, its lifecycle `NewsState`, and the owned `Category`,
//!   `Person` and `Attachment` records.
//! - Provide in-memory helpers used by filter actions (labeling, copying).
//!
//! # Invariants
//! - A news item lives in exactly one container: the bin named by `bin_id`,
//!   or the feed whose link equals `feed_link` when `bin_id` is `None`.
//! - `DELETED` is a soft-delete: the row stays loadable until retention
//!   purges it.
//! - Labels have set semantics keyed by label id.

use crate::model::entity::EntityId;
use crate::model::label::Label;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle state of one news item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsState {
    New,
    Unread,
    Read,
    Updated,
    Hidden,
    Deleted,
}

impl NewsState {
    pub const ALL: [NewsState; 6] = [
        Self::New,
        Self::Unread,
        Self::Read,
        Self::Updated,
        Self::Hidden,
        Self::Deleted,
    ];

    /// Stable storage/log name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Updated => "updated",
            Self::Hidden => "hidden",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "unread" => Some(Self::Unread),
            "read" => Some(Self::Read),
            "updated" => Some(Self::Updated),
            "hidden" => Some(Self::Hidden),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// NEW, UNREAD and UPDATED count as unread.
    pub fn is_unread(self) -> bool {
        matches!(self, Self::New | Self::Unread | Self::Updated)
    }

    /// HIDDEN and DELETED news are not shown in their container.
    pub fn is_visible(self) -> bool {
        !matches!(self, Self::Hidden | Self::Deleted)
    }
}

/// Container a news item currently lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsContainer {
    /// Feed identified by link key.
    Feed(String),
    /// News bin identified by id.
    Bin(EntityId),
}

/// One news item delivered by a feed, or copied into a bin.
#[derive(Debug, Clone)]
pub struct News {
    pub(crate) id: Option<EntityId>,
    /// Link of the feed this news originates from.
    pub feed_link: String,
    /// Bin holding this news. `None` when it lives in its feed.
    pub bin_id: Option<EntityId>,
    pub title: Option<String>,
    /// Article link. News sharing a link are duplicates of each other.
    pub link: Option<String>,
    pub guid: Option<String>,
    pub description: Option<String>,
    /// Unix epoch milliseconds.
    pub publish_date: Option<i64>,
    /// Unix epoch milliseconds.
    pub received_date: i64,
    pub state: NewsState,
    pub sticky: bool,
    pub labels: Vec<Label>,
    pub categories: Vec<Category>,
    pub author: Option<Person>,
    pub attachments: Vec<Attachment>,
}

impl News {
    /// Creates a `NEW` news item living in the feed with `feed_link`.
    pub fn new(feed_link: impl Into<String>) -> Self {
        Self {
            id: None,
            feed_link: feed_link.into(),
            bin_id: None,
            title: None,
            link: None,
            guid: None,
            description: None,
            publish_date: None,
            received_date: now_epoch_ms(),
            state: NewsState::New,
            sticky: false,
            labels: Vec::new(),
            categories: Vec::new(),
            author: None,
            attachments: Vec::new(),
        }
    }

    pub fn container(&self) -> NewsContainer {
        match self.bin_id {
            Some(bin_id) => NewsContainer::Bin(bin_id),
            None => NewsContainer::Feed(self.feed_link.clone()),
        }
    }

    /// Publish date when known, receive date otherwise.
    pub fn effective_date(&self) -> i64 {
        self.publish_date.unwrap_or(self.received_date)
    }

    /// Adds a saved label. Returns `false` when already present or unsaved.
    pub fn add_label(&mut self, label: &Label) -> bool {
        let Some(label_id) = label.id else {
            return false;
        };
        if self.has_label(label_id) {
            return false;
        }
        self.labels.push(label.clone());
        true
    }

    /// Removes a label by id. Returns `false` when it was not present.
    pub fn remove_label(&mut self, label_id: EntityId) -> bool {
        let before = self.labels.len();
        self.labels.retain(|label| label.id != Some(label_id));
        before != self.labels.len()
    }

    pub fn has_label(&self, label_id: EntityId) -> bool {
        self.labels.iter().any(|label| label.id == Some(label_id))
    }

    pub fn add_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Returns an independent, unsaved copy placed into `bin_id`.
    ///
    /// State, flags and labels are carried over as they are right now; owned
    /// sub-entities are duplicated without ids.
    pub fn copy_into_bin(&self, bin_id: EntityId) -> News {
        let mut copy = self.clone();
        copy.id = None;
        copy.bin_id = Some(bin_id);
        for category in &mut copy.categories {
            category.id = None;
        }
        for attachment in &mut copy.attachments {
            attachment.id = None;
        }
        if let Some(author) = copy.author.as_mut() {
            author.id = None;
        }
        copy
    }
}

/// Category tag delivered with a news item.
#[derive(Debug, Clone)]
pub struct Category {
    pub(crate) id: Option<EntityId>,
    pub name: Option<String>,
    pub domain: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Author of a news item.
#[derive(Debug, Clone)]
pub struct Person {
    pub(crate) id: Option<EntityId>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub uri: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            email: None,
            uri: None,
        }
    }
}

/// Enclosure delivered with a news item.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub(crate) id: Option<EntityId>,
    pub link: String,
    pub mime_type: Option<String>,
    pub length: Option<i64>,
}

impl Attachment {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            id: None,
            link: link.into(),
            mime_type: None,
            length: None,
        }
    }
}

pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{Category, News, NewsState};
    use crate::model::label::Label;

    #[test]
    fn add_label_has_set_semantics() {
        let mut label = Label::new("Important");
        label.id = Some(4);
        let mut news = News::new("https://example.com/feed.xml");

        assert!(news.add_label(&label));
        assert!(!news.add_label(&label));
        assert_eq!(news.labels.len(), 1);
    }

    #[test]
    fn add_label_ignores_unsaved_label() {
        let mut news = News::new("https://example.com/feed.xml");
        assert!(!news.add_label(&Label::new("Draft")));
        assert!(news.labels.is_empty());
    }

    #[test]
    fn copy_into_bin_clears_identities_and_keeps_state() {
        let mut news = News::new("https://example.com/feed.xml");
        news.id = Some(10);
        news.state = NewsState::Unread;
        let mut category = Category::new("rust");
        category.id = Some(2);
        news.add_category(category);

        let copy = news.copy_into_bin(5);
        assert_eq!(copy.id, None);
        assert_eq!(copy.bin_id, Some(5));
        assert_eq!(copy.state, NewsState::Unread);
        assert_eq!(copy.categories[0].id, None);
        assert_eq!(news.categories[0].id, Some(2));
    }

    #[test]
    fn state_names_round_trip() {
        for state in NewsState::ALL {
            assert_eq!(NewsState::parse(state.as_str()), Some(state));
        }
    }
}
