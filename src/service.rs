use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::config::{BrowserSettings, UsageConfig, WeatherConfig};
use crate::error::ScraperError;
use crate::traits::Scraper;
use crate::usage::{UsageReport, UsageScraper};
use crate::weather::{WeatherReport, WeatherScraper, WEATHER_SETTLE_DELAY};

/// One scrape job plus the browser settings to run it under.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub browser: BrowserSettings,
    pub job: ScrapeJob,
}

#[derive(Debug, Clone)]
pub enum ScrapeJob {
    Weather(WeatherConfig),
    Usage(UsageConfig),
}

impl ScrapeRequest {
    pub fn weather(config: WeatherConfig) -> Self {
        Self {
            browser: BrowserSettings::default(),
            job: ScrapeJob::Weather(config),
        }
    }

    pub fn usage(config: UsageConfig) -> Self {
        Self {
            browser: BrowserSettings::default(),
            job: ScrapeJob::Usage(config),
        }
    }

    pub fn with_browser(mut self, browser: BrowserSettings) -> Self {
        self.browser = browser;
        self
    }
}

/// Result of a completed job.
#[derive(Debug)]
pub enum ScrapeOutcome {
    Weather(WeatherReport),
    Usage(UsageReport),
}

/// Scraper service implementing tower::Service.
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // room for future middleware state (rate limits, caching)
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeOutcome;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        Box::pin(async move {
            let session_config = req.browser.session_config();

            match req.job {
                ScrapeJob::Weather(config) => {
                    info!(
                        "Weather scrape request: {} to {}",
                        config.dates.start, config.dates.end
                    );
                    let session_config = session_config.with_settle_delay(WEATHER_SETTLE_DELAY);
                    let mut scraper = WeatherScraper::new(config, session_config);
                    let report = scraper.execute().await?;
                    info!(
                        "Weather scrape complete: {} periods, {} missing values",
                        report.periods, report.missing_values
                    );
                    Ok(ScrapeOutcome::Weather(report))
                }
                ScrapeJob::Usage(config) => {
                    info!(
                        "Usage scrape request: {} to {}",
                        config.dates.start, config.dates.end
                    );
                    let mut scraper = UsageScraper::new(config, session_config);
                    let report = scraper.execute().await?;
                    info!("Usage scrape complete: {} export windows", report.periods);
                    Ok(ScrapeOutcome::Usage(report))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateRange;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn weather_config() -> WeatherConfig {
        let mut features = BTreeMap::new();
        features.insert("High Temp".to_string(), "temp_high".to_string());
        WeatherConfig {
            url: "https://example.com/history/".to_string(),
            features,
            dates: DateRange {
                start: NaiveDate::from_ymd_opt(2020, 7, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2020, 7, 5).unwrap(),
            },
            data_dir: PathBuf::from("./data"),
        }
    }

    #[test]
    fn test_request_builder() {
        let browser = BrowserSettings {
            chrome: Some(PathBuf::from("/usr/bin/chromium")),
            headless: true,
            debug: false,
        };
        let req = ScrapeRequest::weather(weather_config()).with_browser(browser);

        assert!(matches!(req.job, ScrapeJob::Weather(_)));
        assert!(req.browser.headless);
    }

    #[test]
    fn test_browser_settings_to_session_config() {
        let browser = BrowserSettings {
            chrome: Some(PathBuf::from("/usr/bin/chromium")),
            headless: true,
            debug: true,
        };
        let config = browser.session_config();

        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(config.headless);
        assert!(config.debug);
    }
}
