//! Search-condition evaluation against in-memory news.
//!
//! # Responsibility
//! - Evaluate field/specifier/value conditions on one news item.
//! - Resolve folder-tree locations, transitively through parent folders.
//!
//! # Invariants
//! - Text comparisons are case-insensitive; `*` and `?` are wildcards.
//! - Scope conditions never take part in matching; they only restrict
//!   where a filter applies.
//! - A condition whose value type does not fit its field never matches.

use crate::codec::location::LocationBuckets;
use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::news::News;
use crate::model::search::{Search, SearchCondition, SearchField, SearchSpecifier, SearchValue};
use crate::repo::{folder_repo, mark_repo};
use crate::store::{StoreRead, StoreResult};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Snapshot of the folder tree used for location checks.
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    folder_parents: BTreeMap<EntityId, Option<EntityId>>,
    mark_folders: BTreeMap<EntityRef, EntityId>,
    bookmarks_by_link: BTreeMap<String, Vec<EntityId>>,
}

impl LocationIndex {
    pub fn build<R: StoreRead>(reader: &R) -> StoreResult<Self> {
        let conn = reader.connection();
        let mut index = Self::default();
        for folder in folder_repo::load_all(conn)? {
            if let Some(id) = folder.id {
                index.folder_parents.insert(id, folder.parent_id);
            }
        }
        for mark in mark_repo::load_all_bookmarks(conn)? {
            if let Some(id) = mark.id {
                index
                    .mark_folders
                    .insert(EntityRef::new(EntityKind::BookMark, id), mark.folder_id);
                index
                    .bookmarks_by_link
                    .entry(mark.feed_link)
                    .or_default()
                    .push(id);
            }
        }
        for bin in mark_repo::load_all_news_bins(conn)? {
            if let Some(id) = bin.id {
                index
                    .mark_folders
                    .insert(EntityRef::new(EntityKind::NewsBin, id), bin.folder_id);
            }
        }
        Ok(index)
    }

    /// Returns whether `location` is listed in `buckets` directly or sits
    /// below a listed folder.
    pub fn contains(&self, buckets: &LocationBuckets, location: EntityRef) -> bool {
        if buckets.contains(location) {
            return true;
        }
        let mut folder = match location.kind {
            EntityKind::Folder => self.folder_parents.get(&location.id).copied().flatten(),
            _ => self.mark_folders.get(&location).copied(),
        };
        let mut hops = 0;
        while let Some(folder_id) = folder {
            if buckets.folders().contains(&folder_id) {
                return true;
            }
            hops += 1;
            if hops > self.folder_parents.len() {
                break;
            }
            folder = self.folder_parents.get(&folder_id).copied().flatten();
        }
        false
    }

    /// Tree locations of one news item: its bin, or every bookmark of its
    /// feed.
    pub fn locations_of(&self, news: &News) -> Vec<EntityRef> {
        match news.bin_id {
            Some(bin_id) => vec![EntityRef::new(EntityKind::NewsBin, bin_id)],
            None => self
                .bookmarks_by_link
                .get(&news.feed_link)
                .into_iter()
                .flatten()
                .map(|id| EntityRef::new(EntityKind::BookMark, *id))
                .collect(),
        }
    }

    /// Returns whether any location of `news` lies inside `buckets`.
    pub fn news_within(&self, buckets: &LocationBuckets, news: &News) -> bool {
        self.locations_of(news)
            .into_iter()
            .any(|location| self.contains(buckets, location))
    }
}

/// Inputs shared by every condition of one evaluation pass.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub index: &'a LocationIndex,
    /// Unix epoch milliseconds used for age conditions.
    pub now_ms: i64,
}

/// Evaluates the non-scope conditions of `search`.
///
/// A search without such conditions matches everything.
pub fn matches_search(search: &Search, news: &News, ctx: &MatchContext<'_>) -> bool {
    let mut conditions = search
        .conditions
        .iter()
        .filter(|condition| !condition.is_scope())
        .peekable();
    if conditions.peek().is_none() {
        return true;
    }
    if search.match_all_conditions {
        conditions.all(|condition| matches_condition(condition, news, ctx))
    } else {
        conditions.any(|condition| matches_condition(condition, news, ctx))
    }
}

pub fn matches_condition(condition: &SearchCondition, news: &News, ctx: &MatchContext<'_>) -> bool {
    let specifier = condition.specifier;
    match (condition.field, &condition.value) {
        (SearchField::State, SearchValue::States(states)) => match specifier {
            SearchSpecifier::Is => states.contains(&news.state),
            SearchSpecifier::IsNot => !states.contains(&news.state),
            _ => false,
        },
        (SearchField::Sticky, SearchValue::Bool(expected)) => {
            compare_bool(specifier, news.sticky, *expected)
        }
        (SearchField::HasAttachments, SearchValue::Bool(expected)) => {
            compare_bool(specifier, !news.attachments.is_empty(), *expected)
        }
        (SearchField::AgeInDays, SearchValue::Number(days)) => {
            let age = (ctx.now_ms - news.effective_date()).max(0) / DAY_MS;
            match specifier {
                SearchSpecifier::Is => age == *days,
                SearchSpecifier::IsNot => age != *days,
                SearchSpecifier::IsGreaterThan => age > *days,
                SearchSpecifier::IsLessThan => age < *days,
                _ => false,
            }
        }
        (SearchField::Location, SearchValue::Location(buckets)) => match specifier {
            SearchSpecifier::Is => ctx.index.news_within(buckets, news),
            SearchSpecifier::IsNot => !ctx.index.news_within(buckets, news),
            _ => false,
        },
        (field, SearchValue::Text(pattern)) => {
            let candidates = text_candidates(field, news);
            match_text(specifier, pattern, &candidates)
        }
        _ => false,
    }
}

fn compare_bool(specifier: SearchSpecifier, actual: bool, expected: bool) -> bool {
    match specifier {
        SearchSpecifier::Is => actual == expected,
        SearchSpecifier::IsNot => actual != expected,
        _ => false,
    }
}

fn text_candidates(field: SearchField, news: &News) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    match field {
        SearchField::Title => out.extend(news.title.as_deref()),
        SearchField::Description => out.extend(news.description.as_deref()),
        SearchField::Author => push_author(&mut out, news),
        SearchField::Category => {
            out.extend(news.categories.iter().filter_map(|c| c.name.as_deref()));
        }
        SearchField::Link => out.extend(news.link.as_deref()),
        SearchField::Feed => out.push(news.feed_link.as_str()),
        SearchField::Label => out.extend(news.labels.iter().map(|label| label.name.as_str())),
        SearchField::AllFields => {
            out.extend(news.title.as_deref());
            out.extend(news.description.as_deref());
            push_author(&mut out, news);
            out.extend(news.categories.iter().filter_map(|c| c.name.as_deref()));
            out.extend(news.link.as_deref());
            out.extend(news.attachments.iter().map(|a| a.link.as_str()));
            out.extend(news.labels.iter().map(|label| label.name.as_str()));
        }
        _ => {}
    }
    out
}

fn push_author<'a>(out: &mut Vec<&'a str>, news: &'a News) {
    if let Some(author) = news.author.as_ref() {
        out.extend(author.name.as_deref());
        out.extend(author.email.as_deref());
    }
}

fn match_text(specifier: SearchSpecifier, pattern: &str, candidates: &[&str]) -> bool {
    let any_match = |anchor_start: bool, anchor_end: bool, pattern: &str| {
        match wildcard_regex(pattern, anchor_start, anchor_end) {
            Some(re) => candidates.iter().any(|candidate| re.is_match(candidate)),
            None => false,
        }
    };
    match specifier {
        SearchSpecifier::Is => any_match(true, true, pattern),
        SearchSpecifier::IsNot => !any_match(true, true, pattern),
        SearchSpecifier::Contains => any_match(false, false, pattern),
        SearchSpecifier::ContainsNot => !any_match(false, false, pattern),
        SearchSpecifier::BeginsWith => any_match(true, false, pattern),
        SearchSpecifier::EndsWith => any_match(false, true, pattern),
        SearchSpecifier::ContainsAll => {
            let mut words = WHITESPACE_RE
                .split(pattern.trim())
                .filter(|word| !word.is_empty())
                .peekable();
            words.peek().is_some() && words.all(|word| any_match(false, false, word))
        }
        SearchSpecifier::IsGreaterThan | SearchSpecifier::IsLessThan | SearchSpecifier::Scope => {
            false
        }
    }
}

/// Compiles a case-insensitive wildcard pattern.
pub fn wildcard_regex(pattern: &str, anchor_start: bool, anchor_end: bool) -> Option<Regex> {
    let mut source = String::from("(?is)");
    if anchor_start {
        source.push('^');
    }
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    if anchor_end {
        source.push('$');
    }
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(err) => {
            warn!("event=search_pattern module=search status=error error={err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{matches_condition, matches_search, wildcard_regex, LocationIndex, MatchContext};
    use crate::codec::location::LocationBuckets;
    use crate::model::entity::{EntityKind, EntityRef};
    use crate::model::news::{Category, News, NewsState};
    use crate::model::search::{
        Search, SearchCondition, SearchField, SearchSpecifier, SearchValue,
    };

    fn text(field: SearchField, specifier: SearchSpecifier, value: &str) -> SearchCondition {
        SearchCondition::new(field, specifier, SearchValue::Text(value.to_string()))
    }

    fn sample() -> News {
        let mut news = News::new("https://example.com/feed.xml");
        news.title = Some("Rust 1.80 Released".to_string());
        news.add_category(Category::new("Programming"));
        news
    }

    fn ctx(index: &LocationIndex) -> MatchContext<'_> {
        MatchContext { index, now_ms: 0 }
    }

    #[test]
    fn wildcards_and_case_are_handled() {
        let re = wildcard_regex("rust*released", true, true).unwrap();
        assert!(re.is_match("Rust 1.80 Released"));
        let re = wildcard_regex("a.b?", false, false).unwrap();
        assert!(re.is_match("xa.bc"));
        assert!(!re.is_match("axbc"));
    }

    #[test]
    fn text_specifiers() {
        let index = LocationIndex::default();
        let news = sample();
        let ctx = ctx(&index);
        assert!(matches_condition(&text(SearchField::Title, SearchSpecifier::Contains, "1.80"), &news, &ctx));
        assert!(matches_condition(&text(SearchField::Title, SearchSpecifier::BeginsWith, "rust"), &news, &ctx));
        assert!(!matches_condition(&text(SearchField::Title, SearchSpecifier::EndsWith, "rust"), &news, &ctx));
        assert!(matches_condition(&text(SearchField::Title, SearchSpecifier::ContainsAll, "released rust"), &news, &ctx));
        assert!(matches_condition(&text(SearchField::Category, SearchSpecifier::Is, "programming"), &news, &ctx));
        assert!(matches_condition(&text(SearchField::AllFields, SearchSpecifier::ContainsNot, "python"), &news, &ctx));
    }

    #[test]
    fn state_and_sticky_conditions() {
        let index = LocationIndex::default();
        let mut news = sample();
        news.sticky = true;
        let ctx = ctx(&index);
        let states = SearchCondition::new(
            SearchField::State,
            SearchSpecifier::Is,
            SearchValue::States(vec![NewsState::New, NewsState::Unread]),
        );
        let sticky = SearchCondition::new(
            SearchField::Sticky,
            SearchSpecifier::Is,
            SearchValue::Bool(true),
        );
        assert!(matches_condition(&states, &news, &ctx));
        assert!(matches_condition(&sticky, &news, &ctx));

        news.state = NewsState::Read;
        let search = Search::new(true).with_condition(states).with_condition(sticky);
        assert!(!matches_search(&search, &news, &ctx));
    }

    #[test]
    fn location_contains_marks_below_listed_folder() {
        let mut index = LocationIndex::default();
        index.folder_parents.insert(1, None);
        index.folder_parents.insert(2, Some(1));
        index
            .mark_folders
            .insert(EntityRef::new(EntityKind::NewsBin, 7), 2);

        let buckets = LocationBuckets::new(vec![1], vec![], vec![]);
        assert!(index.contains(&buckets, EntityRef::new(EntityKind::NewsBin, 7)));
        assert!(index.contains(&buckets, EntityRef::new(EntityKind::Folder, 2)));

        let other = LocationBuckets::new(vec![3], vec![], vec![]);
        assert!(!index.contains(&other, EntityRef::new(EntityKind::NewsBin, 7)));
    }

    #[test]
    fn search_without_plain_conditions_matches_everything() {
        let index = LocationIndex::default();
        let scope_only = Search::new(true).with_condition(SearchCondition::new(
            SearchField::Location,
            SearchSpecifier::Scope,
            SearchValue::Location(LocationBuckets::default()),
        ));
        assert!(matches_search(&scope_only, &sample(), &ctx(&index)));
    }
}
