//! Scoped retention preferences.
//!
//! # Responsibility
//! - Define the retention policy applied after each feed reload.
//! - Resolve it through defaults, global overrides and per-bookmark
//!   overrides, in that order.

use crate::model::entity::EntityId;
use crate::model::folder::BookMark;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Retention policy for the news of one bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionPolicy {
    pub delete_by_count: bool,
    pub max_count: usize,
    pub delete_by_age: bool,
    pub max_age_days: u32,
    /// Unread news (`NEW`, `UNREAD`, `UPDATED`) are never purged by the caps.
    pub keep_unread: bool,
    /// Labeled news are never purged by the caps.
    pub keep_labeled: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            delete_by_count: true,
            max_count: 200,
            delete_by_age: false,
            max_age_days: 30,
            keep_unread: true,
            keep_labeled: true,
        }
    }
}

/// Partial policy; unset fields fall through to the enclosing scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionOverrides {
    pub delete_by_count: Option<bool>,
    pub max_count: Option<usize>,
    pub delete_by_age: Option<bool>,
    pub max_age_days: Option<u32>,
    pub keep_unread: Option<bool>,
    pub keep_labeled: Option<bool>,
}

impl RetentionOverrides {
    pub fn apply_to(&self, policy: &mut RetentionPolicy) {
        if let Some(value) = self.delete_by_count {
            policy.delete_by_count = value;
        }
        if let Some(value) = self.max_count {
            policy.max_count = value;
        }
        if let Some(value) = self.delete_by_age {
            policy.delete_by_age = value;
        }
        if let Some(value) = self.max_age_days {
            policy.max_age_days = value;
        }
        if let Some(value) = self.keep_unread {
            policy.keep_unread = value;
        }
        if let Some(value) = self.keep_labeled {
            policy.keep_labeled = value;
        }
    }
}

/// Source of the effective retention policy for a bookmark.
pub trait PreferenceScope {
    fn retention_policy(&self, bookmark: &BookMark) -> RetentionPolicy;
}

/// Three-level preference store: defaults, global, per bookmark.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopedPreferences {
    pub defaults: RetentionPolicy,
    pub global: RetentionOverrides,
    pub bookmarks: BTreeMap<EntityId, RetentionOverrides>,
}

impl ScopedPreferences {
    pub fn with_global(mut self, overrides: RetentionOverrides) -> Self {
        self.global = overrides;
        self
    }

    pub fn set_bookmark(&mut self, bookmark_id: EntityId, overrides: RetentionOverrides) {
        self.bookmarks.insert(bookmark_id, overrides);
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl PreferenceScope for ScopedPreferences {
    fn retention_policy(&self, bookmark: &BookMark) -> RetentionPolicy {
        let mut policy = self.defaults;
        self.global.apply_to(&mut policy);
        if let Some(overrides) = bookmark.id.and_then(|id| self.bookmarks.get(&id)) {
            overrides.apply_to(&mut policy);
        }
        policy
    }
}

impl PreferenceScope for RetentionPolicy {
    fn retention_policy(&self, _bookmark: &BookMark) -> RetentionPolicy {
        *self
    }
}
