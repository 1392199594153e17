//! Client for the GDACS (Global Disaster Alert and Coordination System)
//! GeoRSS feed.
//!
//! [`GdacsFeed`] fetches the feed, turns each item into an [`Entry`] with its
//! distance from a home location, and applies optional radius and category
//! filters. [`FeedManager`] polls a feed and tells an [`EntityHandler`] which
//! disasters appeared, persisted or disappeared since the previous poll.
//!
//! ```ignore
//! use gdacs_feed::{EntityHandler, FeedManager, GdacsFeed};
//!
//! struct Print;
//!
//! impl EntityHandler for Print {
//!     fn generate(&mut self, id: &str) -> anyhow::Result<()> { println!("new {id}"); Ok(()) }
//!     fn update(&mut self, id: &str) -> anyhow::Result<()> { println!("still {id}"); Ok(()) }
//!     fn remove(&mut self, id: &str) -> anyhow::Result<()> { println!("gone {id}"); Ok(()) }
//! }
//!
//! let feed = GdacsFeed::new(reqwest::Client::new(), (-41.2, 174.7));
//! let mut manager = FeedManager::new(feed, Print);
//! manager.update().await;
//! ```

pub mod config;
pub mod entry;
pub mod feed;
pub mod manager;
pub mod util;

pub use entry::{Entry, EntryProfile, FieldValue, ATTRIBUTION};
pub use feed::{FeedFilter, FeedUpdate, GdacsFeed, UpdateStatus};
pub use manager::{EntityEvent, EntityHandler, FeedManager, StatusUpdate};
