//! Walks the usage portal's calendar backwards in 30-day export windows,
//! one site-generated download per window.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use tracing::info;

use crate::config::{SessionConfig, UsageConfig};
use crate::dates::{CalendarCursor, DateWindow};
use crate::error::ScraperError;
use crate::session::{PageDriver, PageSession};
use crate::traits::Scraper;
use crate::usage::login::{LoginConfirmation, StdinConfirmation};
use crate::usage::sequencer::UiSequencer;

/// Span of data the portal includes in one export.
pub const EXPORT_WINDOW_DAYS: u32 = 30;

#[derive(Debug)]
pub struct UsageReport {
    pub periods: usize,
    pub download_dir: PathBuf,
}

pub struct UsageScraper {
    config: UsageConfig,
    session_config: SessionConfig,
    page: Option<Box<dyn PageDriver>>,
    confirm: Box<dyn LoginConfirmation>,
    sequencer: UiSequencer,
    calendar_start: NaiveDate,
}

impl UsageScraper {
    pub fn new(config: UsageConfig, session_config: SessionConfig) -> Self {
        Self {
            config,
            session_config,
            page: None,
            confirm: Box::new(StdinConfirmation),
            sequencer: UiSequencer::new(),
            calendar_start: Local::now().date_naive(),
        }
    }

    /// Replaces the browser-backed page driver. Used by tests.
    pub fn with_page(mut self, page: Box<dyn PageDriver>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_confirmation(mut self, confirm: Box<dyn LoginConfirmation>) -> Self {
        self.confirm = confirm;
        self
    }

    /// Overrides the month the calendar widget shows when first opened;
    /// the portal opens it on the current month.
    pub fn with_calendar_start(mut self, date: NaiveDate) -> Self {
        self.calendar_start = date;
        self
    }
}

#[async_trait]
impl Scraper for UsageScraper {
    type Output = UsageReport;

    async fn initialize(&mut self) -> Result<(), ScraperError> {
        if self.page.is_none() {
            let session_config = self
                .session_config
                .clone()
                .with_download_dir(self.config.download_dir.clone());
            let session = PageSession::launch(session_config).await?;
            self.page = Some(Box::new(session));
        }
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ScraperError> {
        let page = self
            .page
            .as_deref()
            .ok_or_else(|| ScraperError::BrowserInit("scraper not initialized".into()))?;

        self.sequencer.open_login(page, &self.config.login_url).await?;
        self.confirm.confirm().await?;
        Ok(())
    }

    async fn scrape(&mut self) -> Result<UsageReport, ScraperError> {
        let page = self
            .page
            .as_deref()
            .ok_or_else(|| ScraperError::BrowserInit("scraper not initialized".into()))?;

        self.sequencer
            .open_usage_home(page, &self.config.usage_url)
            .await?;
        self.sequencer.open_daily_view(page).await?;

        let mut calendar = CalendarCursor::new(self.calendar_start);
        let mut periods = 0usize;

        let windows = DateWindow::chunked(
            self.config.dates.start,
            self.config.dates.end,
            EXPORT_WINDOW_DAYS,
        );
        for period in windows {
            // The final window may overshoot the range; never select a day
            // before the configured start.
            let target = period.end.max(self.config.dates.start);
            info!("Getting data for the 30 day period ending {}", target);

            let months_back = calendar.steps_back_to(target);
            self.sequencer.open_date_picker(page, months_back).await?;
            self.sequencer.select_day(page, target.day()).await?;
            self.sequencer.trigger_export(page).await?;
            info!("Export triggered");
            periods += 1;
        }

        // Give the last download time to land before the session goes away.
        page.settle().await;

        Ok(UsageReport {
            periods,
            download_dir: self.config.download_dir.clone(),
        })
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if let Some(mut page) = self.page.take() {
            page.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DateRange;
    use crate::session::Locator;
    use crate::testutil::{AutoConfirm, FakePage};
    use crate::usage::sequencer::{DATE_PICKER_CSS, EXPORT_CSS, PREV_MONTH_LINK};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config(start: NaiveDate, end: NaiveDate) -> UsageConfig {
        UsageConfig {
            login_url: "https://example.com/login".to_string(),
            usage_url: "https://example.com/usage".to_string(),
            dates: DateRange { start, end },
            download_dir: PathBuf::from("./downloads"),
        }
    }

    fn scraper_with(
        page: FakePage,
        start: NaiveDate,
        end: NaiveDate,
        calendar: NaiveDate,
    ) -> UsageScraper {
        UsageScraper::new(config(start, end), SessionConfig::default())
            .with_page(Box::new(page))
            .with_confirmation(Box::new(AutoConfirm))
            .with_calendar_start(calendar)
    }

    fn count(clicks: &[String], locator: &Locator) -> usize {
        let wanted = locator.to_string();
        clicks.iter().filter(|c| **c == wanted).count()
    }

    #[tokio::test]
    async fn test_october_calendar_to_august_target_pages_back_twice() {
        let page = FakePage::new();
        let probe = page.clone();

        let mut scraper = scraper_with(
            page,
            date(2020, 8, 20),
            date(2020, 8, 20),
            date(2020, 10, 15),
        );
        let report = scraper.execute().await.unwrap();

        assert_eq!(report.periods, 1);
        let clicks = probe.clicks();
        assert_eq!(count(&clicks, &Locator::link_text(PREV_MONTH_LINK)), 2);
        assert_eq!(count(&clicks, &Locator::link_text("20")), 1);
        assert_eq!(count(&clicks, &Locator::css(EXPORT_CSS)), 1);
        assert_eq!(
            probe.visits(),
            vec![
                "https://example.com/login".to_string(),
                "https://example.com/usage".to_string(),
            ]
        );
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn test_january_calendar_to_prior_december_pages_back_once() {
        let page = FakePage::new();
        let probe = page.clone();

        let mut scraper = scraper_with(
            page,
            date(2020, 12, 15),
            date(2020, 12, 15),
            date(2021, 1, 10),
        );
        scraper.execute().await.unwrap();

        let clicks = probe.clicks();
        assert_eq!(count(&clicks, &Locator::link_text(PREV_MONTH_LINK)), 1);
    }

    #[tokio::test]
    async fn test_multi_window_run_recomputes_against_shown_month() {
        let page = FakePage::new();
        let probe = page.clone();

        // 59 days at a 30-day step: windows ending 07-30, 06-30, then an
        // overshoot clamped up to the range start 06-01.
        let mut scraper = scraper_with(
            page,
            date(2020, 6, 1),
            date(2020, 7, 30),
            date(2020, 8, 15),
        );
        let report = scraper.execute().await.unwrap();

        assert_eq!(report.periods, 3);
        let clicks = probe.clicks();
        // Aug -> Jul, Jul -> Jun, then June is already showing.
        assert_eq!(count(&clicks, &Locator::link_text(PREV_MONTH_LINK)), 2);
        assert_eq!(count(&clicks, &Locator::css(DATE_PICKER_CSS)), 3);
        assert_eq!(count(&clicks, &Locator::link_text("30")), 2);
        assert_eq!(count(&clicks, &Locator::link_text("1")), 1);
        assert_eq!(count(&clicks, &Locator::css(EXPORT_CSS)), 3);
    }

    #[tokio::test]
    async fn test_stuck_export_control_is_fatal_and_closes_session() {
        let page = FakePage::new().with_unready(&Locator::css(EXPORT_CSS));
        let probe = page.clone();

        let mut scraper = scraper_with(
            page,
            date(2020, 8, 20),
            date(2020, 8, 20),
            date(2020, 10, 15),
        );
        let err = scraper.execute().await.unwrap_err();

        assert!(matches!(err, ScraperError::SyncTimeout { .. }));
        assert_eq!(probe.close_count(), 1);
        // the run stopped before any export was triggered
        assert_eq!(count(&probe.clicks(), &Locator::css(EXPORT_CSS)), 0);
    }

    #[tokio::test]
    #[ignore] // requires Chrome, network access, and an operator to complete the login
    async fn test_live_export_single_window() {
        let login_url = std::env::var("USAGE_LOGIN_URL").expect("USAGE_LOGIN_URL not set");
        let usage_url = std::env::var("USAGE_USAGE_URL").expect("USAGE_USAGE_URL not set");

        let today = Local::now().date_naive();
        let config = UsageConfig {
            login_url,
            usage_url,
            dates: DateRange {
                start: today - chrono::Duration::days(7),
                end: today,
            },
            download_dir: crate::testutil::temp_dir("usage-live"),
        };

        let mut scraper = UsageScraper::new(config, SessionConfig::default());
        let report = scraper.execute().await.unwrap();
        assert_eq!(report.periods, 1);
    }
}
