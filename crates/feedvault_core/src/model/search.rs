//! Search model: conditions and condition groups.
//!
//! # Responsibility
//! - Define the field/specifier/value triple of a search condition.
//! - Define `Search`, the condition group attached to a search filter.
//!
//! # Invariants
//! - Condition values serialize to a stable JSON shape (`SearchValue`).
//! - A `Location` value always carries exactly three id buckets.

use crate::codec::location::LocationBuckets;
use crate::model::entity::EntityId;
use crate::model::news::NewsState;
use serde::{Deserialize, Serialize};

/// News attribute a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    AllFields,
    Title,
    Description,
    Author,
    Category,
    Link,
    Feed,
    State,
    Label,
    Sticky,
    HasAttachments,
    AgeInDays,
    Location,
}

impl SearchField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllFields => "all_fields",
            Self::Title => "title",
            Self::Description => "description",
            Self::Author => "author",
            Self::Category => "category",
            Self::Link => "link",
            Self::Feed => "feed",
            Self::State => "state",
            Self::Label => "label",
            Self::Sticky => "sticky",
            Self::HasAttachments => "has_attachments",
            Self::AgeInDays => "age_in_days",
            Self::Location => "location",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all_fields" => Some(Self::AllFields),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "author" => Some(Self::Author),
            "category" => Some(Self::Category),
            "link" => Some(Self::Link),
            "feed" => Some(Self::Feed),
            "state" => Some(Self::State),
            "label" => Some(Self::Label),
            "sticky" => Some(Self::Sticky),
            "has_attachments" => Some(Self::HasAttachments),
            "age_in_days" => Some(Self::AgeInDays),
            "location" => Some(Self::Location),
            _ => None,
        }
    }
}

/// Comparison a condition applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSpecifier {
    Is,
    IsNot,
    Contains,
    ContainsAll,
    ContainsNot,
    BeginsWith,
    EndsWith,
    IsGreaterThan,
    IsLessThan,
    /// Restricts where a filter applies instead of what it matches.
    Scope,
}

impl SearchSpecifier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Contains => "contains",
            Self::ContainsAll => "contains_all",
            Self::ContainsNot => "contains_not",
            Self::BeginsWith => "begins_with",
            Self::EndsWith => "ends_with",
            Self::IsGreaterThan => "is_greater_than",
            Self::IsLessThan => "is_less_than",
            Self::Scope => "scope",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "is" => Some(Self::Is),
            "is_not" => Some(Self::IsNot),
            "contains" => Some(Self::Contains),
            "contains_all" => Some(Self::ContainsAll),
            "contains_not" => Some(Self::ContainsNot),
            "begins_with" => Some(Self::BeginsWith),
            "ends_with" => Some(Self::EndsWith),
            "is_greater_than" => Some(Self::IsGreaterThan),
            "is_less_than" => Some(Self::IsLessThan),
            "scope" => Some(Self::Scope),
            _ => None,
        }
    }
}

/// Typed condition operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SearchValue {
    Text(String),
    Bool(bool),
    Number(i64),
    States(Vec<NewsState>),
    Location(LocationBuckets),
}

/// One `field specifier value` predicate.
#[derive(Debug, Clone)]
pub struct SearchCondition {
    pub(crate) id: Option<EntityId>,
    pub field: SearchField,
    pub specifier: SearchSpecifier,
    pub value: SearchValue,
}

impl SearchCondition {
    pub fn new(field: SearchField, specifier: SearchSpecifier, value: SearchValue) -> Self {
        Self {
            id: None,
            field,
            specifier,
            value,
        }
    }

    /// Returns whether this condition scopes a filter rather than matching.
    pub fn is_scope(&self) -> bool {
        self.specifier == SearchSpecifier::Scope
    }
}

/// Condition group attached to a search filter.
#[derive(Debug, Clone)]
pub struct Search {
    pub(crate) id: Option<EntityId>,
    pub match_all_conditions: bool,
    pub conditions: Vec<SearchCondition>,
}

impl Search {
    pub fn new(match_all_conditions: bool) -> Self {
        Self {
            id: None,
            match_all_conditions,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: SearchCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns the location buckets of the first scope condition, if any.
    pub fn scope(&self) -> Option<&LocationBuckets> {
        self.conditions
            .iter()
            .filter(|condition| condition.is_scope())
            .find_map(|condition| match &condition.value {
                SearchValue::Location(buckets) => Some(buckets),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{SearchCondition, SearchField, SearchSpecifier, SearchValue};
    use crate::codec::location::LocationBuckets;
    use crate::model::news::NewsState;

    #[test]
    fn value_serialization_is_tagged() {
        let value = SearchValue::States(vec![NewsState::New, NewsState::Unread]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["type"], "states");
        assert_eq!(json["value"][0], "new");
    }

    #[test]
    fn location_value_serializes_as_three_buckets() {
        let buckets = LocationBuckets::new(vec![1], vec![2, 2], vec![]);
        let json = serde_json::to_string(&SearchValue::Location(buckets)).unwrap();
        assert_eq!(json, r#"{"type":"location","value":[[1],[2,2],[]]}"#);
    }

    #[test]
    fn scope_detection_uses_specifier() {
        let condition = SearchCondition::new(
            SearchField::Location,
            SearchSpecifier::Scope,
            SearchValue::Location(LocationBuckets::default()),
        );
        assert!(condition.is_scope());
    }
}
