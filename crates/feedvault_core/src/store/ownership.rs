//! Static ownership table and cascade resolution.
//!
//! # Responsibility
//! - Declare, per entity-type pair, whether ownership is exclusive or a
//!   shared reference-counted relation.
//! - Compute the full removal set for a delete request.
//! - Compute the surviving owners whose child collections change.
//!
//! # Invariants
//! - Exclusive edges cascade from owner to owned only.
//! - A shared resource joins the removal set only when every referrer is
//!   already in it.
//! - The removal set lists owners before the entities they own.

use crate::model::entity::{EntityId, EntityKind, EntityRef};
use crate::repo::RepoResult;
use std::collections::{BTreeSet, VecDeque};

/// Kind of an ownership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Owner deletion removes the owned entity; never the reverse.
    Exclusive,
    /// Owned entity lives while at least one referrer survives.
    SharedRefCounted,
}

/// One row of the ownership table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipEdge {
    pub owner: EntityKind,
    pub owned: EntityKind,
    pub ownership: Ownership,
    /// The owner's own owner also sees its collection change.
    pub notify_grandparent: bool,
}

const fn exclusive(owner: EntityKind, owned: EntityKind) -> OwnershipEdge {
    OwnershipEdge {
        owner,
        owned,
        ownership: Ownership::Exclusive,
        notify_grandparent: false,
    }
}

pub const OWNERSHIP_EDGES: &[OwnershipEdge] = &[
    exclusive(EntityKind::Folder, EntityKind::Folder),
    exclusive(EntityKind::Folder, EntityKind::BookMark),
    exclusive(EntityKind::Folder, EntityKind::SearchMark),
    exclusive(EntityKind::Folder, EntityKind::NewsBin),
    OwnershipEdge {
        owner: EntityKind::BookMark,
        owned: EntityKind::Feed,
        ownership: Ownership::SharedRefCounted,
        notify_grandparent: false,
    },
    exclusive(EntityKind::Feed, EntityKind::News),
    exclusive(EntityKind::NewsBin, EntityKind::News),
    exclusive(EntityKind::News, EntityKind::Category),
    exclusive(EntityKind::News, EntityKind::Person),
    exclusive(EntityKind::News, EntityKind::Attachment),
    OwnershipEdge {
        owner: EntityKind::SearchMark,
        owned: EntityKind::SearchCondition,
        ownership: Ownership::Exclusive,
        notify_grandparent: true,
    },
    exclusive(EntityKind::Search, EntityKind::SearchCondition),
    exclusive(EntityKind::SearchFilter, EntityKind::Search),
    exclusive(EntityKind::SearchFilter, EntityKind::FilterAction),
];

/// Edges leaving `owner`.
pub fn edges_from(owner: EntityKind) -> impl Iterator<Item = &'static OwnershipEdge> {
    OWNERSHIP_EDGES.iter().filter(move |edge| edge.owner == owner)
}

/// Exclusive edge between `owner` and `owned`, if declared.
pub fn exclusive_edge(owner: EntityKind, owned: EntityKind) -> Option<&'static OwnershipEdge> {
    OWNERSHIP_EDGES.iter().find(|edge| {
        edge.owner == owner && edge.owned == owned && edge.ownership == Ownership::Exclusive
    })
}

/// Storage queries the resolver needs.
pub trait OwnershipLookup {
    /// Ids of `owned_kind` entities directly owned or referenced by `owner`.
    fn owned_by(&self, owner: EntityRef, owned_kind: EntityKind) -> RepoResult<Vec<EntityId>>;

    /// Exclusive owner of `entity`, if any.
    fn owner_of(&self, entity: EntityRef) -> RepoResult<Option<EntityRef>>;

    /// Referrers keeping a shared resource alive.
    fn referrers_of(&self, shared: EntityRef) -> RepoResult<Vec<EntityRef>>;
}

/// Full transitive set of entities removed together with `roots`.
pub fn cascade_set_for(
    lookup: &impl OwnershipLookup,
    roots: &[EntityRef],
) -> RepoResult<Vec<EntityRef>> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    let mut shared_candidates = BTreeSet::new();
    let mut queue: VecDeque<EntityRef> = roots.iter().copied().collect();

    loop {
        while let Some(entity) = queue.pop_front() {
            if !seen.insert(entity) {
                continue;
            }
            ordered.push(entity);
            for edge in edges_from(entity.kind) {
                for id in lookup.owned_by(entity, edge.owned)? {
                    let owned = EntityRef::new(edge.owned, id);
                    match edge.ownership {
                        Ownership::Exclusive => queue.push_back(owned),
                        Ownership::SharedRefCounted => {
                            shared_candidates.insert(owned);
                        }
                    }
                }
            }
        }

        let mut released = Vec::new();
        for shared in &shared_candidates {
            if seen.contains(shared) {
                continue;
            }
            let referrers = lookup.referrers_of(*shared)?;
            if referrers.iter().all(|referrer| seen.contains(referrer)) {
                released.push(*shared);
            }
        }
        if released.is_empty() {
            break;
        }
        for shared in released {
            shared_candidates.remove(&shared);
            queue.push_back(shared);
        }
    }

    Ok(ordered)
}

/// Surviving owners whose child collections change when `removed` goes.
pub fn affected_ancestors(
    lookup: &impl OwnershipLookup,
    removed: &[EntityRef],
) -> RepoResult<Vec<EntityRef>> {
    let removal: BTreeSet<EntityRef> = removed.iter().copied().collect();
    let mut affected = BTreeSet::new();

    for entity in removed {
        let Some(owner) = lookup.owner_of(*entity)? else {
            continue;
        };
        if !removal.contains(&owner) {
            affected.insert(owner);
        }
        let notify_grandparent = exclusive_edge(owner.kind, entity.kind)
            .map(|edge| edge.notify_grandparent)
            .unwrap_or(false);
        if notify_grandparent {
            if let Some(grandparent) = lookup.owner_of(owner)? {
                if !removal.contains(&grandparent) {
                    affected.insert(grandparent);
                }
            }
        }
    }

    Ok(affected.into_iter().collect())
}
