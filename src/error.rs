use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("browser init error: {0}")]
    BrowserInit(String),

    #[error("navigation error: {0}")]
    Navigation(String),

    #[error("login error: {0}")]
    Login(String),

    #[error("timed out after {waited:?} waiting for {locator}")]
    SyncTimeout { locator: String, waited: Duration },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("javascript error: {0}")]
    JavaScript(String),

    #[error("sequencer error: {0}")]
    Sequence(String),

    #[error("nothing to aggregate in {}", .0.display())]
    EmptyAggregation(PathBuf),

    #[error("file io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
