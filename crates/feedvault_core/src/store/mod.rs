//! Entity store: identity, save/load/delete and units of work.
//!
//! # Responsibility
//! - Assign ids on first save and merge later saves onto the persisted
//!   snapshot.
//! - Resolve delete cascades through the ownership table.
//! - Run every mutation inside one SQLite transaction and dispatch the
//!   coalesced notices after commit.
//!
//! # Invariants
//! - A failed unit of work leaves durable state unchanged and dispatches
//!   nothing.
//! - Loads are read-through; no identity cache survives between calls.

use crate::config::StoreOptions;
use crate::db::{open_db, open_db_in_memory, run_recovery, DbError, SessionMarker, StartupMode};
use crate::event::{DispatchReport, EntityListener, EventBus, FilterListener, ListenerId};
use crate::model::entity::{AnyEntity, Entity, EntityId, EntityKind, EntityRef};
use crate::model::feed::Feed;
use crate::model::filter::SearchFilter;
use crate::model::folder::{BookMark, Folder, FolderChild};
use crate::model::label::Label;
use crate::model::news::News;
use crate::repo::{
    self, feed_repo, filter_repo, folder_repo, label_repo, mark_repo, news_repo, RepoError,
};
use log::{error, info};
use rusqlite::{Connection, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub mod merge;
pub mod ownership;
mod stored;
mod unit_of_work;

pub use stored::StoredEntity;
pub use unit_of_work::UnitOfWork;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Repo(RepoError),
    /// Save of an entity whose id no longer resolves.
    StaleEntity { kind: EntityKind, id: EntityId },
    /// Operation needs a saved entity.
    Unsaved(EntityKind),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::StaleEntity { kind, id } => {
                write!(f, "{kind} {id} no longer exists in the store")
            }
            Self::Unsaved(kind) => write!(f, "{kind} has not been saved yet"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::StaleEntity { .. } | Self::Unsaved(_) => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Read access shared by the store and an open unit of work.
pub trait StoreRead {
    fn connection(&self) -> &Connection;

    fn load<T: StoredEntity>(&self, id: EntityId) -> StoreResult<Option<T>> {
        Ok(T::load_in(self.connection(), id)?)
    }

    fn load_all<T: StoredEntity>(&self) -> StoreResult<Vec<T>> {
        Ok(T::load_all_in(self.connection())?)
    }

    fn load_any(&self, entity: EntityRef) -> StoreResult<Option<AnyEntity>> {
        Ok(repo::load_any(self.connection(), entity)?)
    }

    /// Child folders and marks of a folder, in order.
    fn children(&self, folder_id: EntityId) -> StoreResult<Vec<FolderChild>> {
        Ok(folder_repo::children(self.connection(), folder_id)?)
    }

    fn root_folders(&self) -> StoreResult<Vec<Folder>> {
        Ok(folder_repo::roots(self.connection())?)
    }

    /// Resolves the weak bookmark-to-feed reference.
    fn feed_for(&self, bookmark: &BookMark) -> StoreResult<Option<Feed>> {
        Ok(feed_repo::load_by_link(
            self.connection(),
            &bookmark.feed_link,
        )?)
    }

    fn feed_by_link(&self, link: &str) -> StoreResult<Option<Feed>> {
        Ok(feed_repo::load_by_link(self.connection(), link)?)
    }

    /// Bookmarks keeping `feed` alive.
    fn bookmarks_for(&self, feed: &Feed) -> StoreResult<Vec<BookMark>> {
        Ok(mark_repo::bookmarks_for_link(self.connection(), &feed.link)?)
    }

    /// News living in the feed with `feed_link`, including soft-deleted ones.
    fn news_of_feed(&self, feed_link: &str) -> StoreResult<Vec<News>> {
        Ok(news_repo::of_feed(self.connection(), feed_link)?)
    }

    fn news_of_bin(&self, bin_id: EntityId) -> StoreResult<Vec<News>> {
        Ok(news_repo::of_bin(self.connection(), bin_id)?)
    }

    /// Duplicates: every news with article link `link`.
    fn news_by_link(&self, link: &str) -> StoreResult<Vec<News>> {
        Ok(news_repo::by_link(self.connection(), link)?)
    }

    fn news_with_label(&self, label: &Label) -> StoreResult<Vec<News>> {
        let Some(label_id) = label.id else {
            return Ok(Vec::new());
        };
        let mut news = Vec::new();
        for id in label_repo::news_ids_with_label(self.connection(), label_id)? {
            news.extend(news_repo::load(self.connection(), id)?);
        }
        Ok(news)
    }

    /// Enabled filters in evaluation order.
    fn enabled_filters(&self) -> StoreResult<Vec<SearchFilter>> {
        Ok(filter_repo::load_enabled(self.connection())?)
    }
}

/// Embedded object store over one SQLite connection.
pub struct EntityStore {
    conn: Connection,
    bus: EventBus,
    session: Option<SessionMarker>,
    startup_mode: StartupMode,
    last_report: DispatchReport,
}

impl EntityStore {
    /// Opens the file store described by `options`.
    ///
    /// A session marker left by an unclean shutdown forces
    /// [`StartupMode::Emergency`], which verifies and re-indexes the
    /// database before use.
    pub fn open(options: &StoreOptions) -> StoreResult<Self> {
        let (marker, stale) = SessionMarker::acquire(&options.db_path)?;
        let startup_mode = if stale {
            StartupMode::Emergency
        } else {
            options.startup_mode
        };

        let opened = open_db(&options.db_path).and_then(|conn| {
            if startup_mode == StartupMode::Emergency {
                run_recovery(&conn)?;
            }
            Ok(conn)
        });
        let conn = match opened {
            Ok(conn) => conn,
            Err(err) => {
                error!(
                    "event=store_open module=store status=error mode={} error={}",
                    startup_mode.as_str(),
                    err
                );
                // The marker stays, so the next start runs recovery again.
                return Err(err.into());
            }
        };

        info!(
            "event=store_open module=store status=ok mode={} session={}",
            startup_mode.as_str(),
            marker.session_id()
        );
        Ok(Self {
            conn,
            bus: EventBus::default(),
            session: Some(marker),
            startup_mode,
            last_report: DispatchReport::default(),
        })
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
            bus: EventBus::default(),
            session: None,
            startup_mode: StartupMode::Normal,
            last_report: DispatchReport::default(),
        })
    }

    pub fn startup_mode(&self) -> StartupMode {
        self.startup_mode
    }

    /// Runs `work` as one atomic unit and dispatches its notices after commit.
    ///
    /// When `work` fails, the transaction rolls back and nothing is
    /// dispatched.
    pub fn unit_of_work<T>(
        &mut self,
        work: impl FnOnce(&mut UnitOfWork<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch("PRAGMA defer_foreign_keys = ON;")?;

        let mut uow = UnitOfWork::new(tx);
        let outcome = work(&mut uow).and_then(|value| Ok((value, uow.commit()?)));
        let (value, batch) = match outcome {
            Ok(committed) => committed,
            Err(err) => {
                error!(
                    "event=unit_of_work module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        let store: &EntityStore = self;
        let report = store.bus.dispatch(&batch, store);
        info!(
            "event=unit_of_work module=store status=ok duration_ms={} notices={} listener_failures={}",
            started_at.elapsed().as_millis(),
            batch.len(),
            report.failures.len()
        );
        self.last_report = report;
        Ok(value)
    }

    pub fn save<T: StoredEntity>(&mut self, entity: &mut T) -> StoreResult<()> {
        self.unit_of_work(|uow| uow.save(entity))
    }

    pub fn save_all<T: StoredEntity>(&mut self, entities: &mut [T]) -> StoreResult<()> {
        self.unit_of_work(|uow| uow.save_all(entities))
    }

    pub fn delete<T: Entity>(&mut self, entity: &T) -> StoreResult<()> {
        self.unit_of_work(|uow| uow.delete(entity))
    }

    /// Deletes every referenced entity and its cascade in one unit of work.
    ///
    /// Returns the number of physically removed entities.
    pub fn delete_all(&mut self, entities: &[EntityRef]) -> StoreResult<usize> {
        self.unit_of_work(|uow| uow.delete_all(entities))
    }

    pub fn add_listener(
        &mut self,
        kind: EntityKind,
        listener: Arc<dyn EntityListener>,
    ) -> ListenerId {
        self.bus.add_listener(kind, listener)
    }

    pub fn remove_listener(&mut self, kind: EntityKind, id: ListenerId) -> bool {
        self.bus.remove_listener(kind, id)
    }

    pub fn add_filter_listener(&mut self, listener: Arc<dyn FilterListener>) -> ListenerId {
        self.bus.add_filter_listener(listener)
    }

    pub fn remove_filter_listener(&mut self, id: ListenerId) -> bool {
        self.bus.remove_filter_listener(id)
    }

    /// Listener outcome of the most recent committed unit of work.
    pub fn last_dispatch_report(&self) -> &DispatchReport {
        &self.last_report
    }

    /// Flushes the write-ahead log, closes the database and removes the
    /// session marker.
    pub fn shutdown(self) -> StoreResult<()> {
        let Self { conn, session, .. } = self;
        if session.is_some() {
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
        }
        conn.close().map_err(|(_, err)| StoreError::from(err))?;
        if let Some(marker) = session {
            marker.release()?;
        }
        info!("event=store_shutdown module=store status=ok");
        Ok(())
    }
}

impl StoreRead for EntityStore {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}
