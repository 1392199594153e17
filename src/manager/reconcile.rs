//! Snapshot diffing.
//!
//! A [`Snapshot`] is the accepted entry set of one poll. [`diff`] compares two
//! of them by `external_id` only and yields the notifications a manager must
//! dispatch: every new id once, every persisting id once, every vanished id
//! once. Field values are never compared, so an unchanged entity still
//! produces an [`EntityEvent::Updated`].

use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;
use std::fmt;

use crate::entry::Entry;

/// The entries accepted by one poll, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entries: Vec<Entry>,
    last_timestamp: Option<DateTime<FixedOffset>>,
}

impl Snapshot {
    pub fn new(entries: Vec<Entry>) -> Self {
        let last_timestamp = entries.iter().filter_map(|e| e.published).max();
        Self {
            entries,
            last_timestamp,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Latest `published` among the entries.
    pub fn last_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.last_timestamp
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry carrying `external_id`.
    pub fn get(&self, external_id: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|e| e.external_id.as_deref() == Some(external_id))
    }

    /// Identities in feed order; entries without one are skipped.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.external_id.as_deref())
    }
}

/// A change to one tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    Created(String),
    Updated(String),
    Removed(String),
}

impl EntityEvent {
    pub fn external_id(&self) -> &str {
        match self {
            EntityEvent::Created(id) | EntityEvent::Updated(id) | EntityEvent::Removed(id) => id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            EntityEvent::Created(_) => "generate",
            EntityEvent::Updated(_) => "update",
            EntityEvent::Removed(_) => "remove",
        }
    }
}

impl fmt::Display for EntityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.action(), self.external_id())
    }
}

/// Per-kind event counts of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl ChangeCounts {
    pub fn of(events: &[EntityEvent]) -> Self {
        events.iter().fold(Self::default(), |mut counts, event| {
            match event {
                EntityEvent::Created(_) => counts.created += 1,
                EntityEvent::Updated(_) => counts.updated += 1,
                EntityEvent::Removed(_) => counts.removed += 1,
            }
            counts
        })
    }
}

/// Events turning `previous` into `next`.
///
/// Ordering: all creations (in `next` order), then all updates (in `next`
/// order), then all removals (in `previous` order). An id repeated within a
/// snapshot is reported once, at its first position.
pub fn diff(previous: &Snapshot, next: &Snapshot) -> Vec<EntityEvent> {
    let previous_ids: HashSet<&str> = previous.ids().collect();

    let mut next_ids: HashSet<&str> = HashSet::new();
    let mut created = Vec::new();
    let mut updated = Vec::new();
    for id in next.ids() {
        if !next_ids.insert(id) {
            continue;
        }
        if previous_ids.contains(id) {
            updated.push(EntityEvent::Updated(id.to_string()));
        } else {
            created.push(EntityEvent::Created(id.to_string()));
        }
    }

    let mut removed_ids: HashSet<&str> = HashSet::new();
    let removed = previous
        .ids()
        .filter(|id| !next_ids.contains(id) && removed_ids.insert(*id))
        .map(|id| EntityEvent::Removed(id.to_string()));

    created.into_iter().chain(updated).chain(removed).collect()
}
