use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use gdacs_feed::config::Config;
use gdacs_feed::manager::{CycleReport, Snapshot};
use gdacs_feed::util::{display_width, one_line, truncate_to_width};
use gdacs_feed::{EntityEvent, EntityHandler, Entry, FeedManager, GdacsFeed, StatusUpdate};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Get the config file path (~/.config/gdacs-feed/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("gdacs-feed")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "gdacs-feed",
    about = "Watch the GDACS disaster alert feed around a home location"
)]
struct Args {
    /// Config file (default: ~/.config/gdacs-feed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Home latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Home longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Only show events within this many kilometres of home
    #[arg(long, value_name = "KM")]
    radius: Option<f64>,

    /// Only show events of this category (repeatable, e.g. --category Drought)
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Feed URL
    #[arg(long)]
    url: Option<String>,

    /// Minutes between polls
    #[arg(long, value_name = "MINUTES")]
    interval: Option<u64>,

    /// Poll once and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(lat) = self.lat {
            config.latitude = lat;
        }
        if let Some(lon) = self.lon {
            config.longitude = lon;
        }
        if let Some(radius) = self.radius {
            config.filter_radius_km = Some(radius);
        }
        if !self.categories.is_empty() {
            config.filter_categories = Some(self.categories.clone());
        }
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(interval) = self.interval {
            config.refresh_interval_minutes = interval;
        }
    }
}

/// Logs every notification and the per-cycle summary.
struct LoggingHandler;

impl EntityHandler for LoggingHandler {
    fn generate(&mut self, external_id: &str) -> Result<()> {
        tracing::info!(external_id = %external_id, "New event");
        Ok(())
    }

    fn update(&mut self, external_id: &str) -> Result<()> {
        tracing::debug!(external_id = %external_id, "Event still active");
        Ok(())
    }

    fn remove(&mut self, external_id: &str) -> Result<()> {
        tracing::info!(external_id = %external_id, "Event removed");
        Ok(())
    }

    fn status(&mut self, status: &StatusUpdate) {
        tracing::debug!(
            status = %status.status,
            last_timestamp = ?status.last_timestamp,
            failed = status.failed_notifications,
            "Cycle status"
        );
    }
}

fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&w: &usize| w > 0)
        .unwrap_or(100)
}

fn describe(entry: &Entry) -> String {
    let title = entry.title.as_deref().map(one_line).unwrap_or_default();
    let distance = entry
        .distance_to_home
        .map(|d| format!("{:.0} km", d))
        .unwrap_or_else(|| "? km".to_string());
    format!("{:<16} {:>9}  {}", entry.category, distance, title)
}

fn print_report(report: &CycleReport, snapshot: &Snapshot) {
    let width = terminal_width();
    for event in &report.events {
        let marker = match event {
            EntityEvent::Created(_) => '+',
            EntityEvent::Updated(_) => ' ',
            EntityEvent::Removed(_) => '-',
        };
        let id = one_line(event.external_id());
        let detail = snapshot.get(event.external_id()).map(describe).unwrap_or_default();
        let line = format!("{} {:<12} {}", marker, id, detail);
        let line = truncate_to_width(line.trim_end(), width);
        if display_width(&line) > 0 {
            println!("{}", line);
        }
    }
}

async fn poll(manager: &mut FeedManager<LoggingHandler>) {
    let report = manager.update_with_events().await;
    print_report(&report, &manager.snapshot());
    println!(
        "[{}] {} events, last published {}",
        report.status,
        manager.entries().len(),
        manager
            .last_timestamp()
            .map(|t| t.to_rfc2822())
            .unwrap_or_else(|| "n/a".to_string())
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("gdacs-feed/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let feed = GdacsFeed::new(client, config.home())
        .with_url(config.url.clone())
        .with_filter(config.filter())
        .with_fetch_options(config.fetch_options());
    tracing::info!(feed = %feed, "Starting");
    let mut manager = FeedManager::new(feed, LoggingHandler);

    let interval = match config.refresh_interval() {
        Some(interval) if !args.once => interval,
        _ => {
            poll(&mut manager).await;
            return Ok(());
        }
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down");
                break;
            }

            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received Ctrl-C during update, shutting down");
                        break;
                    }
                    _ = poll(&mut manager) => {}
                }
            }
        }
    }

    tracing::debug!(interval = ?interval, "Stopped polling");
    Ok(())
}
