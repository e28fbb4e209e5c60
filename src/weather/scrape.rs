//! Orchestrates the day-by-day walk over a weather-history site: one page
//! load per date, newest first, with per-day extraction feeding the run
//! aggregator.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use tracing::info;

use crate::aggregate::RunAggregator;
use crate::config::{SessionConfig, WeatherConfig};
use crate::dates::DateWindow;
use crate::error::ScraperError;
use crate::session::{Locator, PageDriver, PageSession};
use crate::traits::Scraper;
use crate::weather::extract;

/// Pause after row readiness. The bottom of the summary table (the day
/// length field in particular) can render after the first rows appear.
pub const WEATHER_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Element whose presence signals that the history tables have rendered.
const READY_ROW_CSS: &str = "tr";

#[derive(Debug)]
pub struct WeatherReport {
    pub daily_path: PathBuf,
    pub hourly_path: Option<PathBuf>,
    pub periods: usize,
    pub missing_values: u32,
}

pub struct WeatherScraper {
    config: WeatherConfig,
    session_config: SessionConfig,
    page: Option<Box<dyn PageDriver>>,
}

impl WeatherScraper {
    pub fn new(config: WeatherConfig, session_config: SessionConfig) -> Self {
        Self {
            config,
            session_config,
            page: None,
        }
    }

    /// Replaces the browser-backed page driver. Used by tests to run the
    /// full walk against scripted pages.
    pub fn with_page(mut self, page: Box<dyn PageDriver>) -> Self {
        self.page = Some(page);
        self
    }

    fn page(&self) -> Result<&dyn PageDriver, ScraperError> {
        self.page
            .as_deref()
            .ok_or_else(|| ScraperError::BrowserInit("scraper not initialized".into()))
    }
}

#[async_trait]
impl Scraper for WeatherScraper {
    type Output = WeatherReport;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        if self.page.is_none() {
            let session = PageSession::launch(self.session_config.clone()).await?;
            self.page = Some(Box::new(session));
        }
        Ok(())
    }

    async fn scrape(&mut self) -> Result<WeatherReport, ScraperError> {
        let page = self.page()?;
        let ready_row = Locator::css(READY_ROW_CSS);
        let columns: Vec<String> = self.config.features.values().cloned().collect();
        let mut aggregator = RunAggregator::new(columns);
        let mut missing_values: u32 = 0;
        let mut periods = 0usize;

        for period in DateWindow::daily(self.config.dates.start, self.config.dates.end) {
            let date = period.end;
            info!("Getting data for {}", date);

            let url = format!("{}{}", self.config.url, date.format("%Y-%m-%d"));
            page.goto(&url).await?;
            page.wait_ready(&ready_row).await?;
            page.settle().await;

            let html = page.html().await?;
            // Parse and extract inside one block: the parsed document must
            // not be held across an await point.
            let (record, hourly) = {
                let document = Html::parse_document(&html);
                let record =
                    extract::extract_features(&document, &self.config.features, &mut missing_values);
                let hourly = extract::extract_hourly_table(&document);
                (record, hourly)
            };

            aggregator.record_daily(date, record);
            if let Some(table) = hourly {
                aggregator.record_hourly(date, table.columns, table.rows);
            }
            periods += 1;
            info!("Success");
        }

        info!("Missing value count: {}", missing_values);
        let daily_path = aggregator.save_daily(&self.config.data_dir)?;
        let hourly_path = aggregator.save_hourly(&self.config.data_dir)?;

        Ok(WeatherReport {
            daily_path,
            hourly_path,
            periods,
            missing_values,
        })
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if let Some(mut page) = self.page.take() {
            page.close().await?;
        }
        Ok(())
    }
}
