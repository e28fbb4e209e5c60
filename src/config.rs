use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::ScraperError;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DOWNLOAD_DIR: &str = "./downloads";

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_POST_ACTION_DELAY: Duration = Duration::from_millis(100);

/// Tuning for one browser session.
///
/// The settle delay runs after an element reports ready and before we act on
/// it; the rendered widgets finish their animations well after the DOM says
/// they exist. The post-action delay is a short breather after each click.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub debug: bool,
    pub download_dir: Option<PathBuf>,
    pub ready_timeout: Duration,
    pub settle_delay: Duration,
    pub post_action_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            debug: false,
            download_dir: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            post_action_delay: DEFAULT_POST_ACTION_DELAY,
        }
    }
}

impl SessionConfig {
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_post_action_delay(mut self, delay: Duration) -> Self {
        self.post_action_delay = delay;
        self
    }
}

/// `keys/browser.yml`. The file is optional; defaults keep the browser
/// headed, which the manual-login flow depends on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserSettings {
    #[serde(default)]
    pub chrome: Option<PathBuf>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub debug: bool,
}

impl BrowserSettings {
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_headless(self.headless)
            .with_debug(self.debug);
        if let Some(chrome) = &self.chrome {
            config = config.with_chrome_path(chrome.clone());
        }
        config
    }
}

/// Inclusive date range of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.start > self.end {
            return Err(ScraperError::Config(format!(
                "date range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// `keys/weather.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    /// History base URL; one day's page lives at `<url><YYYY-MM-DD>`.
    pub url: String,
    /// On-page label text mapped to its canonical output column.
    pub features: BTreeMap<String, String>,
    pub dates: DateRange,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl WeatherConfig {
    pub fn validate(&self) -> Result<(), ScraperError> {
        self.dates.validate()?;
        if self.features.is_empty() {
            return Err(ScraperError::Config("no features configured".into()));
        }
        Ok(())
    }
}

/// `keys/usage.yml`.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageConfig {
    pub login_url: String,
    pub usage_url: String,
    pub dates: DateRange,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl UsageConfig {
    pub fn validate(&self) -> Result<(), ScraperError> {
        self.dates.validate()
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DOWNLOAD_DIR)
}

pub fn load_weather_config(path: &Path) -> Result<WeatherConfig, ScraperError> {
    let config: WeatherConfig = load_yaml(path)?;
    config.validate()?;
    Ok(config)
}

pub fn load_usage_config(path: &Path) -> Result<UsageConfig, ScraperError> {
    let config: UsageConfig = load_yaml(path)?;
    config.validate()?;
    Ok(config)
}

pub fn load_browser_settings(path: &Path) -> Result<BrowserSettings, ScraperError> {
    if !path.exists() {
        debug!("no browser settings at {}, using defaults", path.display());
        return Ok(BrowserSettings::default());
    }
    load_yaml(path)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ScraperError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ScraperError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    serde_yaml::from_str(&text)
        .map_err(|e| ScraperError::Config(format!("cannot parse {}: {}", path.display(), e)))
}
