//! Feed reload pipeline.
//!
//! # Responsibility
//! - Persist a reloaded feed and its news in one unit of work.
//! - Run filters first and retention second.
//!
//! # Invariants
//! - Either the whole reload commits or nothing does.
//! - Notices of the reload are dispatched once, after commit.

use crate::model::feed::Feed;
use crate::model::folder::BookMark;
use crate::model::news::News;
use crate::prefs::PreferenceScope;
use crate::service::filter_service::{FilterEngine, FilterRunReport};
use crate::service::retention_service::{RetentionReport, RetentionService};
use crate::store::{EntityStore, StoreError, StoreRead};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ReloadError {
    /// The feed or one of the news does not belong to the bookmark's feed.
    FeedMismatch { expected: String, found: String },
    Store(StoreError),
}

impl Display for ReloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeedMismatch { expected, found } => {
                write!(f, "reload for feed `{expected}` received data of `{found}`")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FeedMismatch { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ReloadError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub filters: FilterRunReport,
    pub retention: RetentionReport,
}

pub struct ReloadPipeline<P: PreferenceScope> {
    engine: FilterEngine,
    retention: RetentionService<P>,
}

impl<P: PreferenceScope> ReloadPipeline<P> {
    pub fn new(engine: FilterEngine, prefs: P) -> Self {
        Self {
            engine,
            retention: RetentionService::new(prefs),
        }
    }

    pub fn engine(&self) -> &FilterEngine {
        &self.engine
    }

    /// Stores `feed`, filters `news` and applies retention for `bookmark`.
    pub fn process(
        &self,
        store: &mut EntityStore,
        bookmark: &BookMark,
        feed: &mut Feed,
        news: &mut [News],
    ) -> Result<ReloadOutcome, ReloadError> {
        let foreign = std::iter::once(feed.link.as_str())
            .chain(news.iter().map(|item| item.feed_link.as_str()))
            .find(|link| *link != bookmark.feed_link);
        if let Some(found) = foreign {
            warn!(
                "event=feed_reload module=reload status=rejected feed={} found={}",
                bookmark.feed_link, found
            );
            return Err(ReloadError::FeedMismatch {
                expected: bookmark.feed_link.clone(),
                found: found.to_string(),
            });
        }

        let outcome = store.unit_of_work(|uow| {
            if feed.id.is_none() {
                // A reload may deliver a fresh copy of an already stored feed.
                if let Some(existing) = uow.feed_by_link(&feed.link)? {
                    feed.id = existing.id;
                }
            }
            uow.save(feed)?;
            let filters = self.engine.run_in(uow, bookmark, news)?;
            let retention = self.retention.purge(uow, bookmark)?;
            Ok(ReloadOutcome { filters, retention })
        })?;
        Ok(outcome)
    }
}
