use feedvault_core::event::{FailedCallback, ListenerResult};
use feedvault_core::{
    AnyEntity, BookMark, ChangeKind, Entity, EntityKind, EntityListener, EntityRef, EntityStore,
    Folder,
    News, NewsBin, NewsState, SearchCondition, SearchField, SearchMark, SearchSpecifier,
    SearchValue, StoreRead,
};
use std::sync::{Arc, Mutex};

const FEED: &str = "https://events.example.com/rss";

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(ChangeKind, Vec<i64>)>>,
}

impl Recorder {
    fn push(&self, change: ChangeKind, entities: &[AnyEntity]) -> ListenerResult {
        let ids = entities.iter().filter_map(AnyEntity::id).collect();
        self.calls.lock().unwrap().push((change, ids));
        Ok(())
    }

    fn take(&self) -> Vec<(ChangeKind, Vec<i64>)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl EntityListener for Recorder {
    fn on_added(&self, _store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        self.push(ChangeKind::Added, entities)
    }

    fn on_updated(&self, _store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        self.push(ChangeKind::Updated, entities)
    }

    fn on_deleted(&self, _store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        self.push(ChangeKind::Removed, entities)
    }
}

fn listen(store: &mut EntityStore, kind: EntityKind) -> Arc<Recorder> {
    let recorder = Arc::new(Recorder::default());
    store.add_listener(kind, recorder.clone());
    recorder
}

fn root(store: &mut EntityStore) -> Folder {
    let mut folder = Folder::new(None, "Root");
    store.save(&mut folder).unwrap();
    folder
}

#[test]
fn adding_a_child_updates_its_folder() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let root = root(&mut store);
    let folders = listen(&mut store, EntityKind::Folder);
    let marks = listen(&mut store, EntityKind::BookMark);

    let mut mark = BookMark::new(root.id().unwrap(), "Blog", FEED);
    store.save(&mut mark).unwrap();

    assert_eq!(marks.take(), vec![(ChangeKind::Added, vec![mark.id().unwrap()])]);
    assert_eq!(
        folders.take(),
        vec![(ChangeKind::Updated, vec![root.id().unwrap()])]
    );
}

#[test]
fn notices_are_grouped_per_kind_and_change() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let news_events = listen(&mut store, EntityKind::News);

    let mut items = vec![News::new(FEED), News::new(FEED), News::new(FEED)];
    store.save_all(&mut items).unwrap();

    let calls = news_events.take();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, ChangeKind::Added);
    assert_eq!(calls[0].1.len(), 3);
}

#[test]
fn repeated_updates_coalesce_and_removal_wins() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let mut first = News::new(FEED);
    let mut second = News::new(FEED);
    store.save(&mut first).unwrap();
    store.save(&mut second).unwrap();
    let news_events = listen(&mut store, EntityKind::News);

    store
        .unit_of_work(|uow| {
            first.state = NewsState::Read;
            uow.save(&mut first)?;
            first.sticky = true;
            uow.save(&mut first)?;
            second.state = NewsState::Read;
            uow.save(&mut second)?;
            uow.delete(&second)
        })
        .unwrap();

    assert_eq!(
        news_events.take(),
        vec![
            (ChangeKind::Updated, vec![first.id().unwrap()]),
            (ChangeKind::Removed, vec![second.id().unwrap()]),
        ]
    );
}

#[test]
fn batch_delete_updates_each_surviving_parent_once() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let root = root(&mut store);
    let mut kept_parent = Folder::new(root.id(), "F1");
    store.save(&mut kept_parent).unwrap();
    let mut emptied_parent = Folder::new(root.id(), "F2");
    store.save(&mut emptied_parent).unwrap();
    let mut m1 = BookMark::new(kept_parent.id().unwrap(), "m1", FEED);
    store.save(&mut m1).unwrap();
    let mut m2 = BookMark::new(kept_parent.id().unwrap(), "m2", FEED);
    store.save(&mut m2).unwrap();
    let mut m3 = BookMark::new(emptied_parent.id().unwrap(), "m3", FEED);
    store.save(&mut m3).unwrap();

    let folders = listen(&mut store, EntityKind::Folder);
    let marks = listen(&mut store, EntityKind::BookMark);
    let targets: Vec<EntityRef> = [m1.entity_ref(), emptied_parent.entity_ref(), m3.entity_ref()]
        .into_iter()
        .flatten()
        .collect();
    store.delete_all(&targets).unwrap();

    assert_eq!(
        folders.take(),
        vec![
            (
                ChangeKind::Updated,
                vec![root.id().unwrap(), kept_parent.id().unwrap()]
            ),
            (ChangeKind::Removed, vec![emptied_parent.id().unwrap()]),
        ]
    );
    assert_eq!(
        marks.take(),
        vec![(ChangeKind::Removed, vec![m1.id().unwrap(), m3.id().unwrap()])]
    );
    assert!(store.load::<BookMark>(m2.id().unwrap()).unwrap().is_some());
}

#[test]
fn deleting_news_in_bin_updates_the_bin() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let root = root(&mut store);
    let mut bin = NewsBin::new(root.id().unwrap(), "Saved");
    store.save(&mut bin).unwrap();
    let mut news = News::new(FEED).copy_into_bin(bin.id().unwrap());
    store.save(&mut news).unwrap();
    let bins = listen(&mut store, EntityKind::NewsBin);

    store.delete(&news).unwrap();

    assert_eq!(bins.take(), vec![(ChangeKind::Updated, vec![bin.id().unwrap()])]);
}

#[test]
fn removing_search_condition_updates_mark_and_its_folder() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let root = root(&mut store);
    let mut search = SearchMark::new(root.id().unwrap(), "Rust");
    for word in ["rust", "cargo"] {
        search.add_condition(SearchCondition::new(
            SearchField::Title,
            SearchSpecifier::Contains,
            SearchValue::Text(word.to_string()),
        ));
    }
    store.save(&mut search).unwrap();
    let removed_id = search.conditions[1].id().unwrap();

    let folders = listen(&mut store, EntityKind::Folder);
    let marks = listen(&mut store, EntityKind::SearchMark);
    let conditions = listen(&mut store, EntityKind::SearchCondition);

    search.conditions.truncate(1);
    store.save(&mut search).unwrap();

    assert_eq!(conditions.take(), vec![(ChangeKind::Removed, vec![removed_id])]);
    assert_eq!(
        marks.take(),
        vec![(ChangeKind::Updated, vec![search.id().unwrap()])]
    );
    assert_eq!(
        folders.take(),
        vec![(ChangeKind::Updated, vec![root.id().unwrap()])]
    );
    let loaded: SearchMark = store.load(search.id().unwrap()).unwrap().unwrap();
    assert_eq!(loaded.conditions.len(), 1);
}

struct Failing;

impl EntityListener for Failing {
    fn on_added(&self, _store: &EntityStore, _entities: &[AnyEntity]) -> ListenerResult {
        Err("listener refused".into())
    }
}

struct Panicking;

impl EntityListener for Panicking {
    fn on_added(&self, _store: &EntityStore, _entities: &[AnyEntity]) -> ListenerResult {
        panic!("listener exploded");
    }
}

#[test]
fn listener_failures_are_isolated() {
    let mut store = EntityStore::open_in_memory().unwrap();
    store.add_listener(EntityKind::Folder, Arc::new(Failing));
    store.add_listener(EntityKind::Folder, Arc::new(Panicking));
    let healthy = listen(&mut store, EntityKind::Folder);

    let folder = root(&mut store);

    assert_eq!(
        healthy.take(),
        vec![(ChangeKind::Added, vec![folder.id().unwrap()])]
    );
    let report = store.last_dispatch_report();
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|failure| failure.callback
        == FailedCallback::Entity {
            kind: EntityKind::Folder,
            change: ChangeKind::Added,
        }));
    assert!(store.load::<Folder>(folder.id().unwrap()).unwrap().is_some());
}

struct ReadsCommitted {
    seen: Mutex<Option<bool>>,
}

impl EntityListener for ReadsCommitted {
    fn on_added(&self, store: &EntityStore, entities: &[AnyEntity]) -> ListenerResult {
        let id = entities[0].id().ok_or("unsaved entity in notice")?;
        let visible = store.load::<NewsBin>(id)?.is_some();
        *self.seen.lock().unwrap() = Some(visible);
        Ok(())
    }
}

#[test]
fn listeners_run_after_commit_and_failed_units_stay_silent() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let root = root(&mut store);
    let reader = Arc::new(ReadsCommitted {
        seen: Mutex::new(None),
    });
    store.add_listener(EntityKind::NewsBin, reader.clone());

    let failed: Result<(), _> = store.unit_of_work(|uow| {
        let mut bin = NewsBin::new(root.id().unwrap(), "Doomed");
        uow.save(&mut bin)?;
        Err(feedvault_core::StoreError::Unsaved(EntityKind::NewsBin))
    });
    assert!(failed.is_err());
    assert_eq!(*reader.seen.lock().unwrap(), None);

    let mut bin = NewsBin::new(root.id().unwrap(), "Saved");
    store.save(&mut bin).unwrap();
    assert_eq!(*reader.seen.lock().unwrap(), Some(true));
}

#[test]
fn removed_listener_stops_receiving() {
    let mut store = EntityStore::open_in_memory().unwrap();
    let recorder = Arc::new(Recorder::default());
    let id = store.add_listener(EntityKind::Folder, recorder.clone());
    assert!(store.remove_listener(EntityKind::Folder, id));
    assert!(!store.remove_listener(EntityKind::Folder, id));

    root(&mut store);
    assert!(recorder.take().is_empty());
}
