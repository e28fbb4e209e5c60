//! Click sequence for a portal that exposes usage history only through an
//! interactive calendar widget.
//!
//! Every transition is wait-then-click with no retry: a stuck control means
//! the page changed or the session died, and re-clicking risks a duplicate
//! export the site gives no idempotency guarantee for.

use tracing::debug;

use crate::error::ScraperError;
use crate::session::{Locator, PageDriver};

pub const DAILY_LINK: &str = "Daily";
pub const PREV_MONTH_LINK: &str = "Prev";
pub const DATE_PICKER_CSS: &str = r#"[title="Click to select Date"]"#;
pub const EXPORT_CSS: &str = "#lnkExporttoExcel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    LoggedOut,
    AwaitingManualLogin,
    OnUsageHome,
    OnDailyView,
    DatePickerOpen,
    DateSelected,
    ExportTriggered,
}

/// Tracks where the UI walk currently stands and refuses out-of-order
/// actions.
pub struct UiSequencer {
    state: SequencerState,
}

impl UiSequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::LoggedOut,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    fn require(&self, allowed: &[SequencerState], action: &str) -> Result<(), ScraperError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ScraperError::Sequence(format!(
                "cannot {} while in state {:?}",
                action, self.state
            )))
        }
    }

    fn advance(&mut self, next: SequencerState) {
        debug!("sequencer: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Navigate to the login page. The caller is expected to block on the
    /// operator before moving on.
    pub async fn open_login(
        &mut self,
        page: &dyn PageDriver,
        login_url: &str,
    ) -> Result<(), ScraperError> {
        self.require(&[SequencerState::LoggedOut], "open the login page")?;
        page.goto(login_url).await?;
        self.advance(SequencerState::AwaitingManualLogin);
        Ok(())
    }

    pub async fn open_usage_home(
        &mut self,
        page: &dyn PageDriver,
        usage_url: &str,
    ) -> Result<(), ScraperError> {
        self.require(
            &[SequencerState::AwaitingManualLogin],
            "open the usage page",
        )?;
        page.goto(usage_url).await?;
        self.advance(SequencerState::OnUsageHome);
        Ok(())
    }

    pub async fn open_daily_view(&mut self, page: &dyn PageDriver) -> Result<(), ScraperError> {
        self.require(&[SequencerState::OnUsageHome], "open the daily view")?;
        page.click_when_ready(&Locator::link_text(DAILY_LINK)).await?;
        self.advance(SequencerState::OnDailyView);
        Ok(())
    }

    /// Opens the date picker and pages the calendar back `months_back`
    /// months, one "Prev" click per month.
    pub async fn open_date_picker(
        &mut self,
        page: &dyn PageDriver,
        months_back: u32,
    ) -> Result<(), ScraperError> {
        self.require(
            &[SequencerState::OnDailyView, SequencerState::ExportTriggered],
            "open the date picker",
        )?;
        page.click_when_ready(&Locator::css(DATE_PICKER_CSS)).await?;

        let prev = Locator::link_text(PREV_MONTH_LINK);
        for _ in 0..months_back {
            page.click_when_ready(&prev).await?;
        }
        self.advance(SequencerState::DatePickerOpen);
        Ok(())
    }

    /// Selects a day-of-month in the open picker.
    pub async fn select_day(
        &mut self,
        page: &dyn PageDriver,
        day: u32,
    ) -> Result<(), ScraperError> {
        self.require(&[SequencerState::DatePickerOpen], "select a day")?;
        page.click_when_ready(&Locator::link_text(day.to_string()))
            .await?;
        self.advance(SequencerState::DateSelected);
        Ok(())
    }

    pub async fn trigger_export(&mut self, page: &dyn PageDriver) -> Result<(), ScraperError> {
        self.require(&[SequencerState::DateSelected], "trigger an export")?;
        page.click_when_ready(&Locator::css(EXPORT_CSS)).await?;
        self.advance(SequencerState::ExportTriggered);
        Ok(())
    }
}

impl Default for UiSequencer {
    fn default() -> Self {
        Self::new()
    }
}
