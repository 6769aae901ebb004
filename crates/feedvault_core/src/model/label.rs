//! Label model.

use crate::model::entity::EntityId;

/// User-defined label that news can carry.
#[derive(Debug, Clone)]
pub struct Label {
    pub(crate) id: Option<EntityId>,
    pub name: String,
    /// RGB triple, e.g. `"177,39,52"`.
    pub color: String,
    pub order: i32,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            color: "0,0,0".to_string(),
            order: 0,
        }
    }
}
