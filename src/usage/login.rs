//! Human-in-the-loop login.
//!
//! Authentication (passwords, MFA, captchas) is deliberately left to the
//! operator; the run suspends on this one point and resumes when they
//! confirm.

use async_trait::async_trait;
use tokio::task;
use tracing::info;

use crate::error::ScraperError;

#[async_trait]
pub trait LoginConfirmation: Send + Sync {
    /// Blocks until the operator reports that login is complete.
    async fn confirm(&self) -> Result<(), ScraperError>;
}

/// Prompts on stdin and waits for Enter.
pub struct StdinConfirmation;

#[async_trait]
impl LoginConfirmation for StdinConfirmation {
    async fn confirm(&self) -> Result<(), ScraperError> {
        info!("Waiting for manual login...");
        task::spawn_blocking(|| {
            println!("Please log in on the web browser, then press Enter to continue.");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| ())
        })
        .await
        .map_err(|e| ScraperError::Login(e.to_string()))?
        .map_err(|e| ScraperError::Login(e.to_string()))
    }
}
