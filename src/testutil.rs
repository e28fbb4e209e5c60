//! In-memory test doubles for driving scrapers without a browser.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::session::{Locator, PageDriver};
use crate::usage::login::LoginConfirmation;

/// Scripted page driver. Serves fixture HTML per URL and records every
/// navigation, click, and close. Clones share the recorded state, so a clone
/// kept outside the scraper works as a probe.
#[derive(Clone)]
pub struct FakePage {
    pages: HashMap<String, String>,
    unready: HashSet<String>,
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    current: String,
    visits: Vec<String>,
    clicks: Vec<String>,
    close_count: u32,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            unready: HashSet::new(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Marks a locator that never becomes interactable.
    pub fn with_unready(mut self, locator: &Locator) -> Self {
        self.unready.insert(locator.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().unwrap().close_count
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<(), ScraperError> {
        let mut state = self.state.lock().unwrap();
        state.current = url.to_string();
        state.visits.push(url.to_string());
        Ok(())
    }

    async fn wait_ready(&self, locator: &Locator) -> Result<(), ScraperError> {
        if self.unready.contains(&locator.to_string()) {
            return Err(ScraperError::SyncTimeout {
                locator: locator.to_string(),
                waited: Duration::ZERO,
            });
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<(), ScraperError> {
        self.state.lock().unwrap().clicks.push(locator.to_string());
        Ok(())
    }

    async fn html(&self) -> Result<String, ScraperError> {
        let current = self.state.lock().unwrap().current.clone();
        self.pages
            .get(&current)
            .cloned()
            .ok_or_else(|| ScraperError::Navigation(format!("no fixture for {}", current)))
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.state.lock().unwrap().close_count += 1;
        Ok(())
    }
}

/// Login confirmation that returns immediately.
pub struct AutoConfirm;

#[async_trait]
impl LoginConfirmation for AutoConfirm {
    async fn confirm(&self) -> Result<(), ScraperError> {
        Ok(())
    }
}

/// Fresh per-test scratch directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "history-scraper-test-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
