//! Scrapers for server-rendered weather history pages and session-gated
//! usage portals.
//!
//! Both targets share one orchestration model: walk a date range newest
//! first, synchronize each step against asynchronous page rendering, then
//! extract or export that period's data. Results land as range-named CSV
//! tables; a separate merge mode rebuilds the same output from previously
//! downloaded per-period files.
//!
//! # Weather history example
//!
//! ```rust,ignore
//! use history_scraper::config::load_weather_config;
//! use history_scraper::{ScrapeOutcome, ScrapeRequest, ScraperService};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = load_weather_config("keys/weather.yml".as_ref()).unwrap();
//!     let mut service = ScraperService::new();
//!
//!     match service.call(ScrapeRequest::weather(config)).await.unwrap() {
//!         ScrapeOutcome::Weather(report) => {
//!             println!("daily table: {:?}", report.daily_path);
//!         }
//!         _ => unreachable!(),
//!     }
//! }
//! ```
//!
//! # Usage portal example
//!
//! ```rust,ignore
//! use history_scraper::config::load_usage_config;
//! use history_scraper::usage::UsageScraper;
//! use history_scraper::{Scraper, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = load_usage_config("keys/usage.yml".as_ref()).unwrap();
//!     let mut scraper = UsageScraper::new(config, SessionConfig::default());
//!     let report = scraper.execute().await.unwrap();
//!     println!("exports downloaded to {:?}", report.download_dir);
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod dates;
pub mod error;
pub mod service;
pub mod session;
pub mod traits;
pub mod usage;
pub mod weather;

#[cfg(test)]
mod testutil;

// Re-export the main types
pub use aggregate::{merge_artifacts, FieldValue, MergedTable, RunAggregator};
pub use config::{BrowserSettings, SessionConfig, UsageConfig, WeatherConfig};
pub use dates::{CalendarCursor, DateWindow, Period};
pub use error::ScraperError;
pub use service::{ScrapeJob, ScrapeOutcome, ScrapeRequest, ScraperService};
pub use session::{Locator, PageDriver, PageSession};
pub use traits::Scraper;
pub use usage::{UsageReport, UsageScraper};
pub use weather::{WeatherReport, WeatherScraper};
