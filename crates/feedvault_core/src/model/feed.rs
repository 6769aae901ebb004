//! Feed model.
//!
//! A feed is shared by every bookmark whose `feed_link` equals its `link`,
//! and owns the news it delivered (news outside any bin).

use crate::model::entity::EntityId;

/// Subscribed feed, keyed by its unique link.
#[derive(Debug, Clone)]
pub struct Feed {
    pub(crate) id: Option<EntityId>,
    /// Unique link key. Bookmarks and news refer to the feed through it.
    pub link: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Feed {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            id: None,
            link: link.into(),
            title: None,
            description: None,
        }
    }
}
