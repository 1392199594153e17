//! Polling cycle orchestration.
//!
//! A [`FeedManager`] owns one [`GdacsFeed`] and the [`Snapshot`] accepted by
//! the last poll that produced data. Each [`FeedManager::update`] fetches the
//! feed once, diffs the result against the held snapshot, notifies an
//! [`EntityHandler`] and swaps the new snapshot in.
//!
//! | Feed status | Snapshot | Notifications |
//! |---|---|---|
//! | `Success` | replaced by the new entries | generate / update / remove |
//! | `SuccessNoData` | replaced by an empty snapshot | remove for every tracked id |
//! | `Failure` | kept | none |

mod reconcile;

pub use reconcile::{diff, ChangeCounts, EntityEvent, Snapshot};

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::sync::Arc;

use crate::entry::Entry;
use crate::feed::{FeedUpdate, GdacsFeed, UpdateStatus};

/// Receiver of entity notifications.
///
/// Each method gets only the entity's `external_id`; current data is available
/// from [`FeedManager::entries`] once the cycle has finished. An `Err` is
/// logged and counted in [`StatusUpdate::failed_notifications`]; it does not
/// stop the remaining notifications.
pub trait EntityHandler {
    /// A new entity appeared in the feed.
    fn generate(&mut self, external_id: &str) -> anyhow::Result<()>;

    /// A known entity is still in the feed. Sent whether or not its fields changed.
    fn update(&mut self, external_id: &str) -> anyhow::Result<()>;

    /// A known entity left the feed.
    fn remove(&mut self, external_id: &str) -> anyhow::Result<()>;

    /// Summary of a finished cycle, after all entity notifications.
    fn status(&mut self, _status: &StatusUpdate) {}
}

/// Summary of one [`FeedManager::update`] cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: UpdateStatus,
    /// When this cycle started.
    pub last_update: DateTime<Utc>,
    /// Start of the latest cycle that did not fail.
    pub last_update_successful: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<FixedOffset>>,
    /// Entries held after the cycle.
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Notifications whose handler returned an error.
    pub failed_notifications: usize,
}

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub status: UpdateStatus,
    /// Dispatched notifications in dispatch order.
    pub events: Vec<EntityEvent>,
    pub failed_notifications: usize,
}

/// Keeps a handler in sync with the GDACS feed.
///
/// `update` takes `&mut self`: one manager runs one cycle at a time. Use one
/// manager per feed for concurrent polling.
pub struct FeedManager<H> {
    feed: GdacsFeed,
    handler: H,
    snapshot: Arc<Snapshot>,
    last_update: Option<DateTime<Utc>>,
    last_update_successful: Option<DateTime<Utc>>,
}

impl<H: EntityHandler> FeedManager<H> {
    pub fn new(feed: GdacsFeed, handler: H) -> Self {
        Self {
            feed,
            handler,
            snapshot: Arc::new(Snapshot::default()),
            last_update: None,
            last_update_successful: None,
        }
    }

    /// Runs one polling cycle and returns the feed status.
    pub async fn update(&mut self) -> UpdateStatus {
        self.update_with_events().await.status
    }

    /// Runs one polling cycle and returns the dispatched notifications too.
    ///
    /// Dropping the returned future before it completes leaves the manager
    /// untouched: the fetch is the only await point and all state changes
    /// happen after it.
    pub async fn update_with_events(&mut self) -> CycleReport {
        let started = Utc::now();
        let FeedUpdate { status, entries } = self.feed.update().await;
        self.last_update = Some(started);

        let (events, failed_notifications) = match status {
            UpdateStatus::Failure => {
                tracing::warn!(
                    url = %self.feed.url(),
                    kept = self.snapshot.len(),
                    "Update failed, keeping previous entries"
                );
                (Vec::new(), 0)
            }
            UpdateStatus::Success | UpdateStatus::SuccessNoData => {
                let next = Arc::new(Snapshot::new(entries.unwrap_or_default()));
                let events = diff(&self.snapshot, &next);
                let failed = self.dispatch(&events);
                self.snapshot = next;
                self.last_update_successful = Some(started);
                (events, failed)
            }
        };

        let counts = ChangeCounts::of(&events);
        tracing::info!(
            url = %self.feed.url(),
            status = %status,
            total = self.snapshot.len(),
            created = counts.created,
            updated = counts.updated,
            removed = counts.removed,
            "Feed update complete"
        );

        let report = StatusUpdate {
            status,
            last_update: started,
            last_update_successful: self.last_update_successful,
            last_timestamp: self.snapshot.last_timestamp(),
            total: self.snapshot.len(),
            created: counts.created,
            updated: counts.updated,
            removed: counts.removed,
            failed_notifications,
        };
        self.handler.status(&report);

        CycleReport {
            status,
            events,
            failed_notifications,
        }
    }

    /// Sends `events` to the handler in order, returning how many failed.
    fn dispatch(&mut self, events: &[EntityEvent]) -> usize {
        let mut failed = 0;
        for event in events {
            let id = event.external_id();
            let result = match event {
                EntityEvent::Created(_) => self.handler.generate(id),
                EntityEvent::Updated(_) => self.handler.update(id),
                EntityEvent::Removed(_) => self.handler.remove(id),
            };
            if let Err(e) = result {
                failed += 1;
                tracing::warn!(
                    external_id = %id,
                    action = event.action(),
                    error = %e,
                    "Entity handler failed"
                );
            }
        }
        failed
    }
}

impl<H> FeedManager<H> {
    /// Entries accepted by the last poll that produced data.
    pub fn entries(&self) -> &[Entry] {
        self.snapshot.entries()
    }

    /// Latest `published` among [`entries`](Self::entries).
    pub fn last_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.snapshot.last_timestamp()
    }

    /// Shared handle to the current snapshot; stays valid across later cycles.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Start of the latest cycle, failed or not.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Start of the latest cycle that did not fail.
    pub fn last_update_successful(&self) -> Option<DateTime<Utc>> {
        self.last_update_successful
    }

    pub fn feed(&self) -> &GdacsFeed {
        &self.feed
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<H> fmt::Display for FeedManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GdacsFeedManager(feed={})", self.feed)
    }
}
