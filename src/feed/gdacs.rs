use std::fmt;

use crate::entry::{Entry, EntryProfile};
use crate::feed::fetcher::{fetch_bytes, FetchOptions};
use crate::feed::geometry::Point;
use crate::feed::xml::{parse_feed, FeedChannel};

/// The public GDACS RSS feed.
pub const DEFAULT_URL: &str = "https://www.gdacs.org/xml/rss.xml";

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStatus {
    /// The feed was fetched and contained items.
    Success,
    /// The server answered but the document was empty or unreadable.
    SuccessNoData,
    /// The server could not be reached or refused the request.
    Failure,
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStatus::Success => "OK",
            UpdateStatus::SuccessNoData => "OK_NO_DATA",
            UpdateStatus::Failure => "ERROR",
        };
        f.write_str(s)
    }
}

/// Result of [`GdacsFeed::update`].
///
/// `entries` is `None` when nothing could be read: always for
/// [`UpdateStatus::Failure`], and for [`UpdateStatus::SuccessNoData`] when the
/// payload was not a feed document. An empty feed gives `Some(vec![])`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedUpdate {
    pub status: UpdateStatus,
    pub entries: Option<Vec<Entry>>,
}

impl FeedUpdate {
    fn failure() -> Self {
        Self {
            status: UpdateStatus::Failure,
            entries: None,
        }
    }
}

/// Optional home-relative filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedFilter {
    /// Keep entries at most this many kilometres from home (inclusive).
    pub radius_km: Option<f64>,
    /// Keep entries whose category is listed (exact, case-sensitive). An
    /// empty list filters nothing, same as `None`.
    pub categories: Option<Vec<String>>,
}

impl FeedFilter {
    pub fn accepts(&self, entry: &Entry) -> bool {
        if entry.coordinates().is_none() {
            return false;
        }
        if let Some(radius) = self.radius_km {
            match entry.distance_to_home {
                Some(distance) if distance <= radius => {}
                _ => return false,
            }
        }
        if let Some(categories) = self.categories.as_ref().filter(|c| !c.is_empty()) {
            if !categories.iter().any(|c| *c == entry.category) {
                return false;
            }
        }
        true
    }
}

/// The GDACS feed seen from one home location.
#[derive(Debug, Clone)]
pub struct GdacsFeed {
    client: reqwest::Client,
    url: String,
    home: Point,
    filter: FeedFilter,
    options: FetchOptions,
    profile: EntryProfile,
}

impl GdacsFeed {
    /// A feed on [`DEFAULT_URL`] without filters.
    pub fn new(client: reqwest::Client, home: (f64, f64)) -> Self {
        Self {
            client,
            url: DEFAULT_URL.to_string(),
            home: Point::new(home.0, home.1),
            filter: FeedFilter::default(),
            options: FetchOptions::default(),
            profile: EntryProfile::GDACS,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_filter(mut self, filter: FeedFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn home(&self) -> (f64, f64) {
        self.home.as_tuple()
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    /// Fetches, parses and filters the feed.
    ///
    /// Never fails: transport errors become [`UpdateStatus::Failure`] and
    /// unreadable payloads [`UpdateStatus::SuccessNoData`], both logged.
    pub async fn update(&self) -> FeedUpdate {
        let bytes = match fetch_bytes(&self.client, &self.url, &self.options).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Feed fetch failed");
                return FeedUpdate::failure();
            }
        };
        self.entries_from_document(&bytes)
    }

    /// Parses and filters an already downloaded document.
    pub fn entries_from_document(&self, bytes: &[u8]) -> FeedUpdate {
        match parse_feed(bytes) {
            Ok(channel) => self.entries_from_channel(channel),
            Err(e) => {
                // Observed upstream: occasional bodies of NUL bytes. Not a hard failure.
                tracing::warn!(
                    url = %self.url,
                    error = %e,
                    "Feed payload unreadable, treating as no data"
                );
                FeedUpdate {
                    status: UpdateStatus::SuccessNoData,
                    entries: None,
                }
            }
        }
    }

    fn entries_from_channel(&self, channel: FeedChannel) -> FeedUpdate {
        if channel.items.is_empty() {
            tracing::debug!(url = %self.url, "Feed contains no items");
            return FeedUpdate {
                status: UpdateStatus::SuccessNoData,
                entries: Some(Vec::new()),
            };
        }

        let total = channel.items.len();
        let entries: Vec<Entry> = channel
            .items
            .into_iter()
            .map(|item| Entry::new(item, &self.home, &self.profile))
            .filter(|entry| self.filter.accepts(entry))
            .collect();

        tracing::debug!(
            url = %self.url,
            total = total,
            kept = entries.len(),
            "Filtered feed entries"
        );

        FeedUpdate {
            status: UpdateStatus::Success,
            entries: Some(entries),
        }
    }
}

impl fmt::Display for GdacsFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GdacsFeed(home={}, url={}, radius={:?}, categories={:?})",
            self.home, self.url, self.filter.radius_km, self.filter.categories
        )
    }
}
