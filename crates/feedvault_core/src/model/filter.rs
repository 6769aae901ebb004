//! News filter model.
//!
//! # Responsibility
//! - Define `SearchFilter`, an ordered rule that matches incoming news.
//! - Define `FilterAction`, a tagged action (`action_id` + opaque data).
//!
//! # Invariants
//! - Filters run in ascending `order`; ties resolve by id.
//! - Action data is an opaque JSON value interpreted by the action handler
//!   registered for `action_id`.

use crate::model::entity::EntityId;
use crate::model::search::Search;
use serde_json::Value;

/// Action ids understood by the built-in action registry.
pub mod action_ids {
    pub const MARK_READ: &str = "mark_read";
    pub const MARK_UNREAD: &str = "mark_unread";
    pub const MARK_STICKY: &str = "mark_sticky";
    pub const LABEL_NEWS: &str = "label_news";
    pub const COPY_NEWS: &str = "copy_news";
    pub const MOVE_NEWS: &str = "move_news";
    pub const DELETE_NEWS: &str = "delete_news";
    pub const STOP_FILTER: &str = "stop_filter";
}

/// One action of a filter.
#[derive(Debug, Clone)]
pub struct FilterAction {
    pub(crate) id: Option<EntityId>,
    pub action_id: String,
    pub data: Option<Value>,
}

impl FilterAction {
    pub fn new(action_id: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: None,
            action_id: action_id.into(),
            data,
        }
    }

    pub fn mark_read() -> Self {
        Self::new(action_ids::MARK_READ, None)
    }

    pub fn mark_unread() -> Self {
        Self::new(action_ids::MARK_UNREAD, None)
    }

    pub fn mark_sticky() -> Self {
        Self::new(action_ids::MARK_STICKY, None)
    }

    pub fn label(label_id: EntityId) -> Self {
        Self::new(action_ids::LABEL_NEWS, Some(Value::from(label_id)))
    }

    pub fn copy_to_bins(bin_ids: &[EntityId]) -> Self {
        Self::new(action_ids::COPY_NEWS, Some(Value::from(bin_ids.to_vec())))
    }

    pub fn move_to_bins(bin_ids: &[EntityId]) -> Self {
        Self::new(action_ids::MOVE_NEWS, Some(Value::from(bin_ids.to_vec())))
    }

    pub fn delete() -> Self {
        Self::new(action_ids::DELETE_NEWS, None)
    }

    pub fn stop() -> Self {
        Self::new(action_ids::STOP_FILTER, None)
    }

    pub fn is_stop(&self) -> bool {
        self.action_id == action_ids::STOP_FILTER
    }
}

/// Ordered news filter.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub(crate) id: Option<EntityId>,
    pub name: String,
    pub order: i32,
    pub enabled: bool,
    /// Matches every news in scope, ignoring `search` conditions.
    pub match_all_news: bool,
    pub search: Option<Search>,
    pub actions: Vec<FilterAction>,
}

impl SearchFilter {
    pub fn new(name: impl Into<String>, order: i32) -> Self {
        Self {
            id: None,
            name: name.into(),
            order,
            enabled: true,
            match_all_news: false,
            search: None,
            actions: Vec::new(),
        }
    }

    pub fn matching_all_news(mut self) -> Self {
        self.match_all_news = true;
        self
    }

    pub fn with_search(mut self, search: Search) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_action(mut self, action: FilterAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Returns whether matched news skip every later filter.
    pub fn stops_processing(&self) -> bool {
        self.actions.iter().any(FilterAction::is_stop)
    }
}
