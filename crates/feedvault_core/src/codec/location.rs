//! Location codec for folder-tree references inside search conditions.
//!
//! # Responsibility
//! - Encode folders, bookmarks and bins into a three-bucket id structure.
//! - Decode buckets back into live entities through the store.
//!
//! # Invariants
//! - Bucket 0 holds folder ids, bucket 1 bookmark ids, bucket 2 bin ids.
//! - Membership and multiplicity per bucket are preserved by encoding and by
//!   the JSON form `[[folders],[bookmarks],[bins]]`.
//! - Decoding silently drops ids that no longer resolve.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::model::folder::{BookMark, Folder, NewsBin};
use crate::store::{StoreRead, StoreResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const FOLDER_BUCKET: usize = 0;
pub const BOOKMARK_BUCKET: usize = 1;
pub const NEWS_BIN_BUCKET: usize = 2;

/// Three-bucket id structure referenced by location conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[Vec<EntityId>; 3]", into = "[Vec<EntityId>; 3]")]
pub struct LocationBuckets {
    buckets: [Vec<EntityId>; 3],
}

impl LocationBuckets {
    pub fn new(folders: Vec<EntityId>, bookmarks: Vec<EntityId>, bins: Vec<EntityId>) -> Self {
        Self {
            buckets: [folders, bookmarks, bins],
        }
    }

    pub fn folders(&self) -> &[EntityId] {
        &self.buckets[FOLDER_BUCKET]
    }

    pub fn bookmarks(&self) -> &[EntityId] {
        &self.buckets[BOOKMARK_BUCKET]
    }

    pub fn bins(&self) -> &[EntityId] {
        &self.buckets[NEWS_BIN_BUCKET]
    }

    pub fn bucket(&self, index: usize) -> &[EntityId] {
        &self.buckets[index]
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Returns whether `entity` is listed directly in its bucket.
    pub fn contains(&self, entity: EntityRef) -> bool {
        match bucket_for(entity.kind) {
            Some(index) => self.buckets[index].contains(&entity.id),
            None => false,
        }
    }

    /// Returns each bucket sorted, for order-insensitive comparison.
    pub fn sorted(&self) -> [Vec<EntityId>; 3] {
        let mut buckets = self.buckets.clone();
        for bucket in &mut buckets {
            bucket.sort_unstable();
        }
        buckets
    }
}

impl From<[Vec<EntityId>; 3]> for LocationBuckets {
    fn from(buckets: [Vec<EntityId>; 3]) -> Self {
        Self { buckets }
    }
}

impl From<LocationBuckets> for [Vec<EntityId>; 3] {
    fn from(value: LocationBuckets) -> Self {
        value.buckets
    }
}

/// A folder-tree location a condition can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Folder(Folder),
    BookMark(BookMark),
    NewsBin(NewsBin),
}

impl Location {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Folder(_) => EntityKind::Folder,
            Self::BookMark(_) => EntityKind::BookMark,
            Self::NewsBin(_) => EntityKind::NewsBin,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        match self {
            Self::Folder(folder) => folder.id,
            Self::BookMark(mark) => mark.id,
            Self::NewsBin(bin) => bin.id,
        }
    }
}

impl From<Folder> for Location {
    fn from(value: Folder) -> Self {
        Self::Folder(value)
    }
}

impl From<BookMark> for Location {
    fn from(value: BookMark) -> Self {
        Self::BookMark(value)
    }
}

impl From<NewsBin> for Location {
    fn from(value: NewsBin) -> Self {
        Self::NewsBin(value)
    }
}

/// Error raised when encoding locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationCodecError {
    /// Unsaved entities have no id to encode.
    Unsaved(EntityKind),
}

impl Display for LocationCodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsaved(kind) => write!(f, "cannot encode unsaved {kind} as a location"),
        }
    }
}

impl Error for LocationCodecError {}

/// Encodes locations into buckets, keeping input order and duplicates.
pub fn encode(locations: &[Location]) -> Result<LocationBuckets, LocationCodecError> {
    let mut buckets = LocationBuckets::default();
    for location in locations {
        let id = location
            .id()
            .ok_or(LocationCodecError::Unsaved(location.kind()))?;
        if let Some(index) = bucket_for(location.kind()) {
            buckets.buckets[index].push(id);
        }
    }
    Ok(buckets)
}

/// Resolves buckets to live entities, dropping ids that no longer exist.
pub fn decode<R: StoreRead>(
    reader: &R,
    buckets: &LocationBuckets,
) -> StoreResult<Vec<Location>> {
    let mut locations = Vec::new();
    let mut dropped = 0usize;

    for id in buckets.folders() {
        match reader.load::<Folder>(*id)? {
            Some(folder) => locations.push(Location::Folder(folder)),
            None => dropped += 1,
        }
    }
    for id in buckets.bookmarks() {
        match reader.load::<BookMark>(*id)? {
            Some(mark) => locations.push(Location::BookMark(mark)),
            None => dropped += 1,
        }
    }
    for id in buckets.bins() {
        match reader.load::<NewsBin>(*id)? {
            Some(bin) => locations.push(Location::NewsBin(bin)),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(
            "event=location_decode module=codec status=partial resolved={} dropped={}",
            locations.len(),
            dropped
        );
    }
    Ok(locations)
}

fn bucket_for(kind: EntityKind) -> Option<usize> {
    match kind {
        EntityKind::Folder => Some(FOLDER_BUCKET),
        EntityKind::BookMark => Some(BOOKMARK_BUCKET),
        EntityKind::NewsBin => Some(NEWS_BIN_BUCKET),
        _ => None,
    }
}
