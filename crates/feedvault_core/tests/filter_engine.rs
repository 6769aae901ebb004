use feedvault_core::codec::location::{encode, LocationBuckets};
use feedvault_core::event::ListenerResult;
use feedvault_core::{
    BookMark, Entity, EntityStore, FilterAction, FilterEngine, FilterListener, Folder, Label,
    Location, News, NewsBin, NewsState, Search, SearchCondition, SearchField, SearchFilter,
    SearchSpecifier, SearchValue, StoreRead,
};
use std::sync::{Arc, Mutex};

const FEED: &str = "https://filters.example.com/rss";

struct Fixture {
    store: EntityStore,
    root: Folder,
    bookmark: BookMark,
}

fn setup() -> Fixture {
    let mut store = EntityStore::open_in_memory().unwrap();
    let mut root = Folder::new(None, "Root");
    store.save(&mut root).unwrap();
    let mut bookmark = BookMark::new(root.id().unwrap(), "Filters", FEED);
    store.save(&mut bookmark).unwrap();
    Fixture {
        store,
        root,
        bookmark,
    }
}

fn titled(title: &str) -> News {
    let mut news = News::new(FEED);
    news.title = Some(title.to_string());
    news.link = Some(format!("https://filters.example.com/{}", title.replace(' ', "-")));
    news
}

fn title_contains(word: &str) -> Search {
    Search::new(true).with_condition(SearchCondition::new(
        SearchField::Title,
        SearchSpecifier::Contains,
        SearchValue::Text(word.to_string()),
    ))
}

fn saved_bin(fixture: &mut Fixture, name: &str) -> NewsBin {
    let mut bin = NewsBin::new(fixture.root.id().unwrap(), name);
    fixture.store.save(&mut bin).unwrap();
    bin
}

fn saved_label(fixture: &mut Fixture, name: &str) -> Label {
    let mut label = Label::new(name);
    fixture.store.save(&mut label).unwrap();
    label
}

fn run(fixture: &mut Fixture, news: &mut [News]) {
    FilterEngine::default()
        .run(&mut fixture.store, &fixture.bookmark, news)
        .unwrap();
}

#[test]
fn filters_run_in_order_and_stop_short_circuits() {
    let mut fixture = setup();
    let urgent = saved_label(&mut fixture, "Urgent");

    // Saved first, runs second.
    let mut mark_all_read = SearchFilter::new("Read everything", 1)
        .matching_all_news()
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut mark_all_read).unwrap();
    let mut urgent_first = SearchFilter::new("Urgent", 0)
        .with_search(title_contains("urgent"))
        .with_action(FilterAction::stop())
        .with_action(FilterAction::label(urgent.id().unwrap()));
    fixture.store.save(&mut urgent_first).unwrap();

    let mut news = vec![titled("urgent fix"), titled("weekly digest")];
    run(&mut fixture, &mut news);

    assert!(news.iter().all(|item| item.id().is_some()));
    assert_eq!(news[0].state, NewsState::New);
    assert!(news[0].has_label(urgent.id().unwrap()));
    assert_eq!(news[1].state, NewsState::Read);
    assert!(news[1].labels.is_empty());

    let stored: News = fixture.store.load(news[0].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.state, NewsState::New);
    assert_eq!(stored.labels.len(), 1);
}

#[test]
fn sticky_news_stop_before_the_read_filter() {
    let mut fixture = setup();
    let mut sticky_first = SearchFilter::new("A", 0)
        .with_search(Search::new(true).with_condition(SearchCondition::new(
            SearchField::Sticky,
            SearchSpecifier::Is,
            SearchValue::Bool(true),
        )))
        .with_action(FilterAction::stop())
        .with_action(FilterAction::mark_sticky());
    fixture.store.save(&mut sticky_first).unwrap();
    let mut read_all = SearchFilter::new("B", 1)
        .matching_all_news()
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut read_all).unwrap();

    let mut news1 = titled("news1");
    news1.sticky = true;
    let mut news = vec![news1, titled("news2"), titled("news3")];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::New);
    assert!(news[0].sticky);
    assert_eq!(news[1].state, NewsState::Read);
    assert_eq!(news[2].state, NewsState::Read);
    for item in &news {
        let stored: News = fixture.store.load(item.id().unwrap()).unwrap().unwrap();
        assert_eq!(stored.state, item.state);
    }
}

#[test]
fn move_copies_into_bin_and_soft_deletes_original() {
    let mut fixture = setup();
    let bin = saved_bin(&mut fixture, "Archive");
    let mut filter = SearchFilter::new("Archive releases", 0)
        .with_search(title_contains("release"))
        .with_action(FilterAction::move_to_bins(&[bin.id().unwrap()]));
    fixture.store.save(&mut filter).unwrap();

    let mut news = vec![titled("release 1.0"), titled("meetup")];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::Deleted);
    assert_eq!(news[1].state, NewsState::New);
    let archived = fixture.store.news_of_bin(bin.id().unwrap()).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].title.as_deref(), Some("release 1.0"));
    assert_eq!(archived[0].state, NewsState::New);
    let in_feed = fixture.store.news_of_feed(FEED).unwrap();
    assert_eq!(in_feed.len(), 2);
}

#[test]
fn copy_keeps_original_and_fills_every_valid_bin() {
    let mut fixture = setup();
    let first = saved_bin(&mut fixture, "First");
    let second = saved_bin(&mut fixture, "Second");
    let mut filter = SearchFilter::new("Copy", 0)
        .matching_all_news()
        .with_action(FilterAction::copy_to_bins(&[
            first.id().unwrap(),
            9_999,
            second.id().unwrap(),
        ]));
    fixture.store.save(&mut filter).unwrap();

    let mut news = vec![titled("hello")];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::New);
    assert_eq!(fixture.store.news_of_bin(first.id().unwrap()).unwrap().len(), 1);
    assert_eq!(fixture.store.news_of_bin(second.id().unwrap()).unwrap().len(), 1);
}

#[test]
fn move_to_missing_bin_is_a_noop() {
    let mut fixture = setup();
    let mut filter = SearchFilter::new("Broken move", 0)
        .matching_all_news()
        .with_action(FilterAction::move_to_bins(&[9_999]));
    fixture.store.save(&mut filter).unwrap();

    let mut news = vec![titled("stays put")];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::New);
    let stored: News = fixture.store.load(news[0].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.state, NewsState::New);
}

#[test]
fn labeling_twice_keeps_one_label() {
    let mut fixture = setup();
    let label = saved_label(&mut fixture, "Rust");
    for order in 0..2 {
        let mut filter = SearchFilter::new(format!("Label {order}"), order)
            .with_search(title_contains("rust"))
            .with_action(FilterAction::label(label.id().unwrap()));
        fixture.store.save(&mut filter).unwrap();
    }

    let mut news = vec![titled("rust news")];
    run(&mut fixture, &mut news);
    run(&mut fixture, &mut news);

    let stored: News = fixture.store.load(news[0].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.labels.len(), 1);
}

#[test]
fn delete_action_is_soft_and_unknown_actions_are_skipped() {
    let mut fixture = setup();
    let mut filter = SearchFilter::new("Drop ads", 0)
        .with_search(title_contains("sponsored"))
        .with_action(FilterAction::new("play_sound", None))
        .with_action(FilterAction::delete());
    fixture.store.save(&mut filter).unwrap();

    let mut news = vec![titled("sponsored post")];
    run(&mut fixture, &mut news);

    let stored: News = fixture.store.load(news[0].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.state, NewsState::Deleted);
}

#[test]
fn disabled_filters_are_ignored() {
    let mut fixture = setup();
    let mut filter = SearchFilter::new("Off", 0)
        .matching_all_news()
        .with_action(FilterAction::mark_read());
    filter.enabled = false;
    fixture.store.save(&mut filter).unwrap();

    let mut news = vec![titled("anything")];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::New);
}

fn scoped_to(buckets: LocationBuckets) -> Search {
    Search::new(true).with_condition(SearchCondition::new(
        SearchField::Location,
        SearchSpecifier::Scope,
        SearchValue::Location(buckets),
    ))
}

#[test]
fn scoped_filters_only_apply_inside_their_folder() {
    let mut fixture = setup();
    let root_id = fixture.root.id().unwrap();
    let mut inside = Folder::new(Some(root_id), "Inside");
    fixture.store.save(&mut inside).unwrap();
    let mut nested = Folder::new(inside.id(), "Nested");
    fixture.store.save(&mut nested).unwrap();

    let scope = encode(&[Location::from(inside.clone())]).unwrap();
    let mut filter = SearchFilter::new("Scoped", 0)
        .matching_all_news()
        .with_search(scoped_to(scope))
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut filter).unwrap();

    // Bookmark at the root: outside the scope.
    let mut outside_news = vec![titled("outside")];
    run(&mut fixture, &mut outside_news);
    assert_eq!(outside_news[0].state, NewsState::New);

    let mut nested_mark = BookMark::new(nested.id().unwrap(), "Nested feed", FEED);
    fixture.store.save(&mut nested_mark).unwrap();
    let mut inside_news = vec![titled("inside")];
    FilterEngine::default()
        .run(&mut fixture.store, &nested_mark, &mut inside_news)
        .unwrap();
    assert_eq!(inside_news[0].state, NewsState::Read);
}

#[derive(Default)]
struct AppliedRecorder {
    calls: Mutex<Vec<(String, usize)>>,
}

impl FilterListener for AppliedRecorder {
    fn on_filter_applied(
        &self,
        _store: &feedvault_core::EntityStore,
        filter: &SearchFilter,
        news: &[News],
    ) -> ListenerResult {
        self.calls
            .lock()
            .unwrap()
            .push((filter.name.clone(), news.len()));
        Ok(())
    }
}

#[test]
fn one_notice_per_applied_filter() {
    let mut fixture = setup();
    let recorder = Arc::new(AppliedRecorder::default());
    fixture.store.add_filter_listener(recorder.clone());

    let mut matches = SearchFilter::new("Rust", 0)
        .with_search(title_contains("rust"))
        .with_action(FilterAction::mark_sticky());
    fixture.store.save(&mut matches).unwrap();
    let mut misses = SearchFilter::new("Go", 1)
        .with_search(title_contains("gopher"))
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut misses).unwrap();

    let mut news = vec![titled("rust 1"), titled("rust 2"), titled("python")];
    let report = FilterEngine::default()
        .run(&mut fixture.store, &fixture.bookmark, &mut news)
        .unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.applied[0].matched, 2);
    assert_eq!(report.saved, 3);
    assert_eq!(
        *recorder.calls.lock().unwrap(),
        vec![("Rust".to_string(), 2)]
    );
    assert!(news[0].sticky && news[1].sticky && !news[2].sticky);
}

#[test]
fn moved_original_stays_deleted_for_later_filters() {
    let mut fixture = setup();
    let bin = saved_bin(&mut fixture, "Archive");
    let mut archive = SearchFilter::new("Archive", 0)
        .matching_all_news()
        .with_action(FilterAction::move_to_bins(&[bin.id().unwrap()]));
    fixture.store.save(&mut archive).unwrap();
    let mut read_all = SearchFilter::new("Read everything", 1)
        .matching_all_news()
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut read_all).unwrap();

    let mut news = vec![titled("moved")];
    let report = FilterEngine::default()
        .run(&mut fixture.store, &fixture.bookmark, &mut news)
        .unwrap();

    assert_eq!(report.applied.len(), 1);
    assert_eq!(news[0].state, NewsState::Deleted);
    let stored: News = fixture.store.load(news[0].id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.state, NewsState::Deleted);
    let archived = fixture.store.news_of_bin(bin.id().unwrap()).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].state, NewsState::New);
}

#[test]
fn read_filter_reaches_stored_duplicate() {
    let mut fixture = setup();
    let mut elsewhere = News::new("https://mirror.example.com/rss");
    elsewhere.link = Some("https://filters.example.com/shared".to_string());
    fixture.store.save(&mut elsewhere).unwrap();
    let mut read_all = SearchFilter::new("Read everything", 0)
        .matching_all_news()
        .with_action(FilterAction::mark_read());
    fixture.store.save(&mut read_all).unwrap();

    let mut fresh = titled("shared");
    fresh.link = elsewhere.link.clone();
    let mut news = vec![fresh];
    run(&mut fixture, &mut news);

    assert_eq!(news[0].state, NewsState::Read);
    let stored: News = fixture.store.load(elsewhere.id().unwrap()).unwrap().unwrap();
    assert_eq!(stored.state, NewsState::Read);
}
