use async_trait::async_trait;
use tracing::error;

use crate::error::ScraperError;

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Result of a completed run.
    type Output: Send;

    /// Launch the browser session.
    async fn initialize(&mut self) -> Result<(), ScraperError>;

    /// Establish whatever session the target site requires. Sites without a
    /// login keep the default.
    async fn login(&mut self) -> Result<(), ScraperError> {
        Ok(())
    }

    /// Walk the site and collect the data.
    async fn scrape(&mut self) -> Result<Self::Output, ScraperError>;

    /// Release browser resources.
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// Full run: initialize, login, scrape, close. The session is closed even
    /// when login or scraping fails, so an aborted run never leaks a browser.
    async fn execute(&mut self) -> Result<Self::Output, ScraperError> {
        self.initialize().await?;

        let result = async {
            self.login().await?;
            self.scrape().await
        }
        .await;

        if let Err(close_err) = self.close().await {
            error!("Failed to close the session: {}", close_err);
            result?;
            return Err(close_err);
        }

        result
    }
}
