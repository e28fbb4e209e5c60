//! Day-by-day scraping of server-rendered weather history pages.

pub mod extract;
pub mod scrape;

pub use scrape::{WeatherReport, WeatherScraper, WEATHER_SETTLE_DELAY};
