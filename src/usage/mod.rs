//! Usage-portal export runs behind a manual login.

pub mod login;
pub mod scrape;
pub mod sequencer;

pub use scrape::{UsageReport, UsageScraper, EXPORT_WINDOW_DAYS};
