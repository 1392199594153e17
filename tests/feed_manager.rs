//! Integration tests for the polling cycle: fetch, filter, reconcile, notify.
//!
//! Each test starts its own wiremock server serving a GDACS-like document and
//! drives a `FeedManager` through one or more cycles, checking the entries it
//! holds and the notifications its handler received.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use gdacs_feed::feed::FetchOptions;
use gdacs_feed::{
    EntityEvent, EntityHandler, FeedFilter, FeedManager, FieldValue, GdacsFeed, StatusUpdate,
    UpdateStatus, ATTRIBUTION,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME: (f64, f64) = (-41.2, 174.7);
const FEED_PATH: &str = "/xml/rss.xml";
const FIXTURE: &str = include_str!("fixtures/gdacs-1.xml");

#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
    statuses: Vec<StatusUpdate>,
}

impl EntityHandler for Recorder {
    fn generate(&mut self, external_id: &str) -> anyhow::Result<()> {
        self.calls.push(format!("generate({})", external_id));
        Ok(())
    }

    fn update(&mut self, external_id: &str) -> anyhow::Result<()> {
        self.calls.push(format!("update({})", external_id));
        Ok(())
    }

    fn remove(&mut self, external_id: &str) -> anyhow::Result<()> {
        self.calls.push(format!("remove({})", external_id));
        Ok(())
    }

    fn status(&mut self, status: &StatusUpdate) {
        self.statuses.push(status.clone());
    }
}

impl Recorder {
    fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.calls)
    }
}

async fn serve(mock_server: &MockServer, template: ResponseTemplate) {
    mock_server.reset().await;
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(template)
        .mount(mock_server)
        .await;
}

fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "application/rss+xml")
        .set_body_string(body)
}

fn manager(mock_server: &MockServer, filter: FeedFilter) -> FeedManager<Recorder> {
    let feed = GdacsFeed::new(reqwest::Client::new(), HOME)
        .with_url(format!("{}{}", mock_server.uri(), FEED_PATH))
        .with_filter(filter)
        .with_fetch_options(FetchOptions {
            timeout: Duration::from_secs(5),
            max_retries: 0,
        });
    FeedManager::new(feed, Recorder::default())
}

fn ids(manager: &FeedManager<Recorder>) -> Vec<String> {
    manager
        .entries()
        .iter()
        .filter_map(|e| e.external_id.clone())
        .collect()
}

fn document(ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                "<item><guid>{}</guid><gdacs:eventtype>EQ</gdacs:eventtype>\
                 <georss:point>-41.0 174.0</georss:point></item>",
                id
            )
        })
        .collect();
    format!("<rss version=\"2.0\"><channel>{}</channel></rss>", items)
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("distance should be present");
    assert!(
        (actual - expected).abs() < 0.1,
        "expected ~{}, got {}",
        expected,
        actual
    );
}

// ============================================================================
// Fixture feed
// ============================================================================

#[tokio::test]
async fn test_first_poll_generates_every_entry() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(&mock_server, FeedFilter::default());

    assert_eq!(manager.update().await, UpdateStatus::Success);

    assert_eq!(
        ids(&manager),
        vec!["TC1000643", "EQ1199929", "DR1013682", "DR1013588"]
    );
    assert_eq!(
        manager.handler_mut().take(),
        vec![
            "generate(TC1000643)",
            "generate(EQ1199929)",
            "generate(DR1013682)",
            "generate(DR1013588)",
        ]
    );
    assert_eq!(
        manager.last_timestamp().map(|t| t.with_timezone(&Utc)),
        Some(Utc.with_ymd_and_hms(2019, 12, 30, 1, 27, 0).unwrap())
    );

    let status = &manager.handler().statuses[0];
    assert_eq!(
        (status.total, status.created, status.updated, status.removed),
        (4, 4, 0, 0)
    );
}

#[tokio::test]
async fn test_fixture_entry_fields() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(&mock_server, FeedFilter::default());
    manager.update().await;

    let snapshot = manager.snapshot();

    let cyclone = snapshot.get("TC1000643").unwrap();
    assert_eq!(cyclone.to_string(), "GdacsFeedEntry(id=TC1000643)");
    assert_eq!(cyclone.category, "Tropical Cyclone");
    assert_eq!(cyclone.coordinates(), Some((-19.4, 59.8)));
    assert_close(cyclone.distance_to_home, 10517.9);
    assert_eq!(cyclone.alert_level.as_deref(), Some("Green"));
    assert_eq!(cyclone.event_name.as_deref(), Some("CALVINIA-19"));
    assert_eq!(cyclone.event_id, Some(1000643));
    assert_eq!(cyclone.version, Some(1));
    assert_eq!(cyclone.is_current, Some(true));
    assert_eq!(cyclone.temporary, Some(false));
    assert_eq!(cyclone.country, None);
    assert_eq!(
        cyclone.vulnerability,
        FieldValue::Text("Mauritius".to_string())
    );
    assert_eq!(
        cyclone.from_date,
        DateTime::parse_from_rfc2822("Sun, 29 Dec 2019 06:00:00 GMT").ok()
    );
    assert_eq!(cyclone.attribution(), ATTRIBUTION);

    let quake = snapshot.get("EQ1199929").unwrap();
    assert_eq!(quake.category, "Earthquake");
    assert_eq!(quake.vulnerability, FieldValue::Numeric(5.01535213120674));
    assert_eq!(quake.country.as_deref(), Some("South Africa"));
    assert_eq!(quake.event_name, None);

    let drought = snapshot.get("DR1013682").unwrap();
    assert_eq!(drought.category, "Drought");
    assert_eq!(drought.duration_in_week, Some(17));
    assert_close(drought.distance_to_home, 16880.3);

    let angola = snapshot.get("DR1013588").unwrap();
    assert_eq!(angola.is_current, Some(false));
    assert_eq!(angola.population, FieldValue::Absent);
}

#[tokio::test]
async fn test_category_filter_generates_only_droughts() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(
        &mock_server,
        FeedFilter {
            radius_km: None,
            categories: Some(vec!["Drought".to_string()]),
        },
    );

    assert_eq!(manager.update().await, UpdateStatus::Success);
    assert_eq!(ids(&manager), vec!["DR1013682", "DR1013588"]);
    assert_eq!(
        manager.handler_mut().take(),
        vec!["generate(DR1013682)", "generate(DR1013588)"]
    );
    assert_close(manager.entries()[0].distance_to_home, 16880.3);
}

#[tokio::test]
async fn test_radius_filter_keeps_nearby_entries() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(
        &mock_server,
        FeedFilter {
            radius_km: Some(11_000.0),
            categories: None,
        },
    );

    manager.update().await;
    let kept: Vec<String> = ids(&manager);
    assert!(kept.contains(&"TC1000643".to_string()));
    assert!(!kept.contains(&"DR1013682".to_string()));
    assert!(manager
        .entries()
        .iter()
        .all(|e| e.distance_to_home.is_some_and(|d| d <= 11_000.0)));
}

#[tokio::test]
async fn test_second_identical_poll_only_updates() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(&mock_server, FeedFilter::default());

    manager.update().await;
    manager.handler_mut().take();

    let report = manager.update_with_events().await;
    assert_eq!(report.status, UpdateStatus::Success);
    assert!(report
        .events
        .iter()
        .all(|e| matches!(e, EntityEvent::Updated(_))));
    assert_eq!(
        manager.handler_mut().take(),
        vec![
            "update(TC1000643)",
            "update(EQ1199929)",
            "update(DR1013682)",
            "update(DR1013588)",
        ]
    );
    assert_eq!(manager.entries().len(), 4);
}

// ============================================================================
// Degraded responses
// ============================================================================

#[tokio::test]
async fn test_null_bytes_on_first_poll_is_no_data() {
    let mock_server = MockServer::start().await;
    serve(
        &mock_server,
        ResponseTemplate::new(200).set_body_bytes(b"\x00\x00\x00".to_vec()),
    )
    .await;
    let mut manager = manager(&mock_server, FeedFilter::default());

    assert_eq!(manager.update().await, UpdateStatus::SuccessNoData);
    assert!(manager.entries().is_empty());
    assert!(manager.handler().calls.is_empty());
    assert_eq!(manager.last_timestamp(), None);
    assert!(manager.last_update_successful().is_some());
}

#[tokio::test]
async fn test_http_errors_keep_previous_entries() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, xml(FIXTURE)).await;
    let mut manager = manager(&mock_server, FeedFilter::default());
    manager.update().await;
    manager.handler_mut().take();
    let timestamp = manager.last_timestamp();

    for status in [500, 404, 429] {
        serve(&mock_server, ResponseTemplate::new(status)).await;
        assert_eq!(manager.update().await, UpdateStatus::Failure);
        assert_eq!(manager.entries().len(), 4);
        assert_eq!(manager.last_timestamp(), timestamp);
        assert!(manager.handler().calls.is_empty());
    }

    // Recovery reconciles against the entries from before the outage
    serve(&mock_server, xml(&document(&["EQ1199929", "NEW1"]))).await;
    assert_eq!(manager.update().await, UpdateStatus::Success);
    assert_eq!(
        manager.handler_mut().take(),
        vec![
            "generate(NEW1)",
            "update(EQ1199929)",
            "remove(TC1000643)",
            "remove(DR1013682)",
            "remove(DR1013588)",
        ]
    );
}

#[tokio::test]
async fn test_unreachable_server_is_failure() {
    let feed = GdacsFeed::new(reqwest::Client::new(), HOME)
        .with_url("http://127.0.0.1:1/xml/rss.xml")
        .with_fetch_options(FetchOptions {
            timeout: Duration::from_secs(5),
            max_retries: 0,
        });
    let mut manager = FeedManager::new(feed, Recorder::default());

    assert_eq!(manager.update().await, UpdateStatus::Failure);
    assert!(manager.last_update().is_some());
    assert_eq!(manager.last_update_successful(), None);
    assert!(manager.entries().is_empty());
}

// ============================================================================
// Reconciliation across cycles
// ============================================================================

#[tokio::test]
async fn test_changed_feed_dispatches_in_pass_order() {
    let mock_server = MockServer::start().await;
    let mut manager = manager(&mock_server, FeedFilter::default());

    serve(&mock_server, xml(&document(&["A", "B", "C"]))).await;
    manager.update().await;
    manager.handler_mut().take();

    serve(&mock_server, xml(&document(&["B", "C", "D"]))).await;
    manager.update().await;

    assert_eq!(
        manager.handler_mut().take(),
        vec!["generate(D)", "update(B)", "update(C)", "remove(A)"]
    );
    assert_eq!(ids(&manager), vec!["B", "C", "D"]);
}

#[tokio::test]
async fn test_empty_feed_removes_everything() {
    let mock_server = MockServer::start().await;
    let mut manager = manager(&mock_server, FeedFilter::default());

    serve(&mock_server, xml(&document(&["A", "B"]))).await;
    manager.update().await;
    manager.handler_mut().take();

    serve(&mock_server, xml("<rss><channel></channel></rss>")).await;
    assert_eq!(manager.update().await, UpdateStatus::SuccessNoData);
    assert_eq!(
        manager.handler_mut().take(),
        vec!["remove(A)", "remove(B)"]
    );
    assert!(manager.entries().is_empty());
}
