use feedvault_core::event::ListenerResult;
use feedvault_core::service::ReloadError;
use feedvault_core::{
    BookMark, Entity, EntityStore, Feed, FilterAction, FilterEngine, FilterListener, Folder,
    News, NewsState, ReloadPipeline, RetentionOverrides, RetentionPolicy, ScopedPreferences,
    Search, SearchCondition, SearchField, SearchFilter, SearchSpecifier, SearchValue, StoreRead,
};
use std::sync::{Arc, Mutex};

const FEED: &str = "https://reload.example.com/rss";
const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn setup() -> (EntityStore, BookMark) {
    let mut store = EntityStore::open_in_memory().unwrap();
    let mut root = Folder::new(None, "Root");
    store.save(&mut root).unwrap();
    let mut bookmark = BookMark::new(root.id().unwrap(), "Reload", FEED);
    store.save(&mut bookmark).unwrap();
    (store, bookmark)
}

fn dated(title: &str, age_days: i64) -> News {
    let mut news = News::new(FEED);
    news.title = Some(title.to_string());
    news.publish_date = Some(news.received_date - age_days * DAY_MS);
    news
}

fn keep_newest(count: usize) -> ScopedPreferences {
    ScopedPreferences::default().with_global(RetentionOverrides {
        max_count: Some(count),
        keep_unread: Some(false),
        ..RetentionOverrides::default()
    })
}

#[test]
fn retention_runs_after_filters() {
    let (mut store, bookmark) = setup();
    let mut filter = SearchFilter::new("Drop sponsored", 0)
        .with_search(Search::new(true).with_condition(SearchCondition::new(
            SearchField::Title,
            SearchSpecifier::Contains,
            SearchValue::Text("sponsored".to_string()),
        )))
        .with_action(FilterAction::delete());
    store.save(&mut filter).unwrap();

    let pipeline = ReloadPipeline::new(FilterEngine::default(), keep_newest(1));
    let mut feed = Feed::new(FEED);
    let mut news = vec![dated("sponsored", 0), dated("old", 5), dated("new", 1)];
    let outcome = pipeline
        .process(&mut store, &bookmark, &mut feed, &mut news)
        .unwrap();

    assert_eq!(outcome.filters.applied.len(), 1);
    assert_eq!(outcome.retention.deleted, 1);
    assert_eq!(outcome.retention.over_count, 1);
    let remaining = store.news_of_feed(FEED).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title.as_deref(), Some("new"));
    assert!(store.feed_by_link(FEED).unwrap().is_some());
}

#[test]
fn sticky_news_survive_the_count_cap() {
    let (mut store, bookmark) = setup();
    let pipeline = ReloadPipeline::new(FilterEngine::default(), keep_newest(2));

    let mut pinned = dated("pinned", 30);
    pinned.sticky = true;
    let mut news = vec![pinned, dated("fresh", 0), dated("stale", 10)];
    pipeline
        .process(&mut store, &bookmark, &mut Feed::new(FEED), &mut news)
        .unwrap();

    let mut titles: Vec<String> = store
        .news_of_feed(FEED)
        .unwrap()
        .into_iter()
        .filter_map(|item| item.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["fresh", "pinned"]);
}

#[test]
fn unread_news_are_kept_by_default() {
    let (mut store, bookmark) = setup();
    let pipeline = ReloadPipeline::new(
        FilterEngine::default(),
        RetentionPolicy {
            max_count: 1,
            ..RetentionPolicy::default()
        },
    );

    let mut news = vec![dated("a", 2), dated("b", 1)];
    pipeline
        .process(&mut store, &bookmark, &mut Feed::new(FEED), &mut news)
        .unwrap();

    assert_eq!(store.news_of_feed(FEED).unwrap().len(), 2);
    assert!(news.iter().all(|item| item.state == NewsState::New));
}

#[test]
fn repeated_reload_reuses_stored_feed() {
    let (mut store, bookmark) = setup();
    let pipeline = ReloadPipeline::new(FilterEngine::default(), RetentionPolicy::default());

    let mut first = Feed::new(FEED);
    pipeline
        .process(&mut store, &bookmark, &mut first, &mut [dated("one", 0)])
        .unwrap();
    let mut second = Feed::new(FEED);
    second.title = Some("Renamed".to_string());
    pipeline
        .process(&mut store, &bookmark, &mut second, &mut [dated("two", 0)])
        .unwrap();

    assert_eq!(second.id(), first.id());
    let feeds = store.load_all::<Feed>().unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].title.as_deref(), Some("Renamed"));
}

#[test]
fn foreign_news_abort_the_reload() {
    let (mut store, bookmark) = setup();
    let pipeline = ReloadPipeline::new(FilterEngine::default(), RetentionPolicy::default());

    let mut news = vec![dated("ok", 0), News::new("https://other.example.com/rss")];
    let err = pipeline
        .process(&mut store, &bookmark, &mut Feed::new(FEED), &mut news)
        .unwrap_err();

    assert!(matches!(err, ReloadError::FeedMismatch { .. }));
    assert!(store.news_of_feed(FEED).unwrap().is_empty());
    assert!(store.feed_by_link(FEED).unwrap().is_none());
}

#[derive(Default)]
struct MatchedNotices {
    news: Mutex<Vec<Vec<i64>>>,
}

impl FilterListener for MatchedNotices {
    fn on_filter_applied(
        &self,
        _store: &EntityStore,
        _filter: &SearchFilter,
        news: &[News],
    ) -> ListenerResult {
        let ids = news.iter().filter_map(|item| item.id()).collect();
        self.news.lock().unwrap().push(ids);
        Ok(())
    }
}

#[test]
fn filter_notice_keeps_news_purged_by_retention() {
    let (mut store, bookmark) = setup();
    let notices = Arc::new(MatchedNotices::default());
    store.add_filter_listener(notices.clone());
    let mut filter = SearchFilter::new("Drop all", 0)
        .matching_all_news()
        .with_action(FilterAction::delete());
    store.save(&mut filter).unwrap();

    let pipeline = ReloadPipeline::new(FilterEngine::default(), RetentionPolicy::default());
    let mut news = vec![dated("a", 0), dated("b", 1)];
    let outcome = pipeline
        .process(&mut store, &bookmark, &mut Feed::new(FEED), &mut news)
        .unwrap();

    assert_eq!(outcome.retention.deleted, 2);
    assert!(store.news_of_feed(FEED).unwrap().is_empty());
    let mut expected: Vec<i64> = news.iter().filter_map(|item| item.id()).collect();
    expected.sort();
    let mut seen = notices.news.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    seen[0].sort();
    assert_eq!(seen[0], expected);
}
