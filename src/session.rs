//! Browser page session: readiness waits, locator-driven clicks, HTML capture.
//!
//! All element access goes through injected JavaScript so that a locator is
//! re-resolved at the moment it is used; readiness is a signal, not a handle
//! that can go stale between the wait and the click.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::ScraperError;

const READY_POLL_INTERVAL_MS: u64 = 250;
const CDP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Addresses one element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector.
    Css(String),
    /// Anchor whose trimmed text equals the given string.
    LinkText(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn link_text(text: impl Into<String>) -> Self {
        Locator::LinkText(text.into())
    }

    /// JavaScript expression evaluating to the element or `null`.
    fn resolver(&self) -> String {
        match self {
            Locator::Css(selector) => {
                format!("document.querySelector({})", js_string(selector))
            }
            Locator::LinkText(text) => format!(
                r#"(() => {{
                    const links = document.querySelectorAll('a');
                    for (let i = 0; i < links.length; i++) {{
                        if (links[i].textContent.trim() === {}) {{
                            return links[i];
                        }}
                    }}
                    return null;
                }})()"#,
                js_string(text)
            ),
        }
    }

    /// Probe script: true once the element exists and is interactable.
    pub(crate) fn ready_probe(&self) -> String {
        format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' &&
                       style.visibility !== 'hidden' &&
                       (rect.width > 0 || rect.height > 0) &&
                       !el.disabled;
            }})()"#,
            self.resolver()
        )
    }

    /// Click script: true if the element was found and clicked.
    pub(crate) fn click_script(&self) -> String {
        format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            self.resolver()
        )
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css \"{}\"", selector),
            Locator::LinkText(text) => write!(f, "link text \"{}\"", text),
        }
    }
}

/// Embeds `text` into injected JavaScript as a quoted string literal.
fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// Capability interface onto one live browser page.
///
/// `wait_ready` polls until the locator is interactable or the session's
/// ready timeout elapses; the timeout is fatal and never retried, because a
/// blind retry of a UI action can double-submit an export.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), ScraperError>;

    async fn wait_ready(&self, locator: &Locator) -> Result<(), ScraperError>;

    async fn click(&self, locator: &Locator) -> Result<(), ScraperError>;

    /// Serialized HTML of the current document.
    async fn html(&self) -> Result<String, ScraperError>;

    /// Pause applied between readiness and the following action.
    async fn settle(&self) {}

    /// Short pause after an action has been dispatched.
    async fn pause(&self) {}

    async fn close(&mut self) -> Result<(), ScraperError>;

    /// Standard action recipe: wait until interactable, let the page settle,
    /// click, breathe.
    async fn click_when_ready(&self, locator: &Locator) -> Result<(), ScraperError> {
        self.wait_ready(locator).await?;
        self.settle().await;
        self.click(locator).await?;
        self.pause().await;
        Ok(())
    }
}

/// Chromium-backed implementation of [`PageDriver`].
pub struct PageSession {
    config: SessionConfig,
    browser: Option<Browser>,
    page: Option<Page>,
}

impl PageSession {
    pub async fn launch(config: SessionConfig) -> Result<Self, ScraperError> {
        info!("Launching browser session...");

        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("history-scraper-{}", unique_id));

        let chrome_path = config.chrome_path.clone().or_else(|| {
            std::env::var("CHROME_PATH")
                .or_else(|_| std::env::var("CHROMIUM_PATH"))
                .ok()
                .map(PathBuf::from)
        });

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .user_data_dir(&user_data_dir);

        if let Some(chrome) = chrome_path {
            builder = builder.chrome_executable(chrome);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(CDP_REQUEST_TIMEOUT_SECS))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        if let Some(download_dir) = &config.download_dir {
            std::fs::create_dir_all(download_dir)?;
            let download_path = download_dir
                .canonicalize()
                .unwrap_or_else(|_| download_dir.clone());

            let download_params = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(download_path.to_string_lossy().to_string())
                .events_enabled(true)
                .build()
                .map_err(|e| ScraperError::BrowserInit(format!("download behavior: {}", e)))?;

            page.execute(download_params)
                .await
                .map_err(|e| ScraperError::BrowserInit(format!("download behavior: {}", e)))?;

            info!("Downloads directed to {}", download_path.display());
        }

        info!("Browser session ready");
        Ok(Self {
            config,
            browser: Some(browser),
            page: Some(page),
        })
    }

    fn page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::BrowserInit("browser session not initialized".into()))
    }

    /// Full-page screenshot into the debug log, for diagnosing waits that
    /// expired on a page that no longer looks like we expect.
    async fn debug_screenshot(&self, tag: &str) {
        if !self.config.debug {
            return;
        }
        let page = match self.page() {
            Ok(page) => page,
            Err(_) => return,
        };
        match page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            Ok(bytes) => {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                debug!("{} screenshot: data:image/png;base64,{}", tag, encoded);
            }
            Err(e) => debug!("screenshot failed: {}", e),
        }
    }
}

#[async_trait]
impl PageDriver for PageSession {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        let page = self.page()?;
        info!("Navigating to {}", url);

        page.goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        Ok(())
    }

    async fn wait_ready(&self, locator: &Locator) -> Result<(), ScraperError> {
        let page = self.page()?;
        let probe = locator.ready_probe();
        let start = std::time::Instant::now();

        loop {
            let ready = match page.evaluate(probe.as_str()).await {
                Ok(result) => result.into_value::<bool>().unwrap_or(false),
                Err(e) => {
                    debug!("readiness probe error: {}", e);
                    false
                }
            };

            if ready {
                debug!("{} ready after {:?}", locator, start.elapsed());
                return Ok(());
            }

            if start.elapsed() >= self.config.ready_timeout {
                self.debug_screenshot("wait-ready timeout").await;
                return Err(ScraperError::SyncTimeout {
                    locator: locator.to_string(),
                    waited: self.config.ready_timeout,
                });
            }

            sleep(Duration::from_millis(READY_POLL_INTERVAL_MS)).await;
        }
    }

    async fn click(&self, locator: &Locator) -> Result<(), ScraperError> {
        let page = self.page()?;
        let clicked = page
            .evaluate(locator.click_script().as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<bool>()
            .unwrap_or(false);

        if !clicked {
            return Err(ScraperError::ElementNotFound(locator.to_string()));
        }

        debug!("clicked {}", locator);
        Ok(())
    }

    async fn html(&self) -> Result<String, ScraperError> {
        let page = self.page()?;
        page.evaluate("document.documentElement.outerHTML")
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value::<String>()
            .map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn settle(&self) {
        sleep(self.config.settle_delay).await;
    }

    async fn pause(&self) {
        sleep(self.config.post_action_delay).await;
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("Closing browser session...");

        // Dropping the handles shuts down the browser process.
        self.page = None;
        self.browser = None;

        info!("Browser session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_locator_scripts() {
        let locator = Locator::css("#lnkExporttoExcel");
        assert!(locator
            .ready_probe()
            .contains(r##"document.querySelector("#lnkExporttoExcel")"##));
        assert!(locator.click_script().contains("el.click()"));
    }

    #[test]
    fn test_link_text_locator_quotes_text() {
        let locator = Locator::link_text(r#"Say "Prev""#);
        let probe = locator.ready_probe();
        assert!(probe.contains(r#""Say \"Prev\"""#));
    }

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("tr").to_string(), "css \"tr\"");
        assert_eq!(
            Locator::link_text("Daily").to_string(),
            "link text \"Daily\""
        );
    }
}
