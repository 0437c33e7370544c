//! Scrape pipeline: fetch, extract, build, upsert.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tourney_adapters::extract_record;
use tourney_core::{StoredTournament, TournamentRecord};
use tourney_storage::{
    BrowserProfile, ChromeRenderer, FetchError, FetcherConfig, MemoryTournamentStore, PageFetcher,
    PersistenceError, PgTournamentStore, RawResponse, Renderer, TournamentStore,
};
use tracing::{info, warn};

pub const CRATE_NAME: &str = "tourney-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererMode {
    Chrome,
    Off,
}

impl RendererMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "0" | "false" => RendererMode::Off,
            _ => RendererMode::Chrome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub database_url: Option<String>,
    pub http_timeout_secs: u64,
    pub render_budget_factor: f64,
    pub renderer: RendererMode,
    pub user_agent: Option<String>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            http_timeout_secs: 20,
            render_budget_factor: 1.25,
            renderer: RendererMode::Chrome,
            user_agent: None,
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            http_timeout_secs: std::env::var("TOURNEY_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.http_timeout_secs),
            render_budget_factor: std::env::var("TOURNEY_RENDER_BUDGET_FACTOR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.render_budget_factor),
            renderer: std::env::var("TOURNEY_RENDERER")
                .map(|v| RendererMode::parse(&v))
                .unwrap_or(defaults.renderer),
            user_agent: std::env::var("TOURNEY_USER_AGENT").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn fetch_budget(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn profile(&self) -> BrowserProfile {
        let mut profile = BrowserProfile::default();
        if let Some(user_agent) = &self.user_agent {
            profile.user_agent = user_agent.clone();
        }
        profile
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// One fetch and one extraction per call; nothing is shared between concurrent scrapes
/// except the store.
pub struct ScrapePipeline {
    fetcher: PageFetcher,
    store: Arc<dyn TournamentStore>,
    budget: Duration,
}

impl ScrapePipeline {
    pub fn new(config: &ScrapeConfig, store: Arc<dyn TournamentStore>) -> Result<Self> {
        let profile = config.profile();
        let renderer: Option<Arc<dyn Renderer>> = match config.renderer {
            RendererMode::Chrome => Some(Arc::new(ChromeRenderer::new(&profile))),
            RendererMode::Off => None,
        };
        let fetcher = PageFetcher::new(
            FetcherConfig {
                profile,
                render_budget_factor: config.render_budget_factor,
                ..FetcherConfig::default()
            },
            renderer,
        )?;
        Ok(Self::with_fetcher(fetcher, store, config.fetch_budget()))
    }

    pub fn with_fetcher(
        fetcher: PageFetcher,
        store: Arc<dyn TournamentStore>,
        budget: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            budget,
        }
    }

    pub fn store(&self) -> Arc<dyn TournamentStore> {
        Arc::clone(&self.store)
    }

    /// Fetches and extracts without persisting. Only fetch failures are errors.
    pub async fn scrape(&self, url: &str) -> Result<TournamentRecord, ScrapeError> {
        let outcome = self.fetcher.fetch(url, self.budget).await?;
        let record = extract_record(&outcome.html, url, &outcome.path);
        info!(url, path = %outcome.path, name = %record.name, "scraped tournament");
        Ok(record)
    }

    /// Same as [`scrape`](Self::scrape) for a response that was already received.
    pub async fn scrape_response(
        &self,
        url: &str,
        raw: RawResponse,
    ) -> Result<TournamentRecord, ScrapeError> {
        let outcome = self.fetcher.settle(url, raw, self.budget).await?;
        Ok(extract_record(&outcome.html, url, &outcome.path))
    }

    pub async fn scrape_and_store(&self, url: &str) -> Result<StoredTournament, ScrapeError> {
        let record = self.scrape(url).await?;
        self.save(&record).await
    }

    pub async fn save(&self, record: &TournamentRecord) -> Result<StoredTournament, ScrapeError> {
        let stored = self.store.upsert_by_identity(record).await?;
        info!(id = stored.id, source_link = %stored.record.source_link, "stored tournament");
        Ok(stored)
    }
}

/// Postgres when `DATABASE_URL` is set (migrations applied), otherwise an in-memory store.
pub async fn connect_store(config: &ScrapeConfig) -> Result<Arc<dyn TournamentStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgTournamentStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set; tournaments are kept in memory only");
            Ok(Arc::new(MemoryTournamentStore::new()))
        }
    }
}

pub async fn pipeline_from_env() -> Result<ScrapePipeline> {
    let config = ScrapeConfig::from_env();
    let store = connect_store(&config).await?;
    ScrapePipeline::new(&config, store)
}
