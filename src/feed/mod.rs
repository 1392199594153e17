//! Feed retrieval for the GDACS GeoRSS feed.
//!
//! This module turns the remote feed into filtered [`Entry`](crate::entry::Entry)
//! values:
//!
//! - **Fetching**: HTTP retrieval with timeout, retry and size limits
//! - **Parsing**: GeoRSS XML into item records with geometries
//! - **Filtering**: distance-to-home radius and category allow-list
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP transport built on `reqwest`
//! - [`xml`] - Event-based GeoRSS parsing using `quick-xml`
//! - [`geometry`] - Points, polygons and haversine distances
//! - [`gdacs`] - The fetch, parse and filter pipeline
//!
//! # Example
//!
//! ```ignore
//! use gdacs_feed::feed::{FeedFilter, GdacsFeed, UpdateStatus};
//!
//! let feed = GdacsFeed::new(reqwest::Client::new(), (-41.2, 174.7)).with_filter(FeedFilter {
//!     radius_km: Some(500.0),
//!     categories: None,
//! });
//! let update = feed.update().await;
//! if update.status == UpdateStatus::Success { /* ... */ }
//! ```

mod fetcher;
mod gdacs;
mod geometry;
mod xml;

pub use fetcher::{fetch_bytes, FetchError, FetchOptions};
pub use gdacs::{FeedFilter, FeedUpdate, GdacsFeed, UpdateStatus, DEFAULT_URL};
pub use geometry::{Geometry, GeometryKind, Point, Polygon};
pub use xml::{parse_feed, FeedChannel, FeedItem, XmlElement, XmlError};
