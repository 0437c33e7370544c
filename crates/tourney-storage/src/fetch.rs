use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER, USER_AGENT};
use reqwest::StatusCode;
use thiserror::Error;
use tourney_core::{BlockReason, FetchPath};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::render::{RenderError, Renderer};

/// Lowercase markers of anti-bot interstitials. Matched against the lowercased body.
pub const BLOCK_SIGNATURES: &[&str] = &[
    "_incapsula_resource",
    "incapsula incident",
    "cf-chl-",
    "cf_chl_opt",
    "challenge-platform",
    "perimeterx",
    "px-captcha",
    "datadome",
    "distil_r_captcha",
    "captcha",
    "id=\"main-iframe\"",
    "id='main-iframe'",
];

/// Statuses that indicate a bot wall when the server still sent a body.
pub const BLOCK_STATUSES: &[u16] = &[403, 429];

/// Upper bound on any derived render budget.
pub const MAX_RENDER_BUDGET: Duration = Duration::from_secs(600);

/// Browser-like request identity shared by the fetcher and the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub referer: String,
}

impl Default for BrowserProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-GB,en;q=0.9".to_string(),
            referer: "https://www.google.com/".to_string(),
        }
    }
}

impl BrowserProfile {
    pub fn header_map(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (USER_AGENT, &self.user_agent),
            (ACCEPT, &self.accept),
            (ACCEPT_LANGUAGE, &self.accept_language),
            (REFERER, &self.referer),
        ] {
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid {name} header value"))?;
            headers.insert(name, value);
        }
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        Ok(headers)
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub profile: BrowserProfile,
    /// Render budget = fetch budget x factor.
    pub render_budget_factor: f64,
    /// Extra time the outer guard allows past the render budget, so a renderer that
    /// stops at its own deadline can still hand back its last snapshot.
    pub render_grace: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            profile: BrowserProfile::default(),
            render_budget_factor: 1.25,
            render_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: String,
}

/// HTML ready for extraction plus the route that produced it.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub html: String,
    pub status: u16,
    pub final_url: String,
    pub path: FetchPath,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {budget:?}")]
    Timeout { url: String, budget: Duration },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("render escalation failed: {0}")]
    Render(#[from] RenderError),
}

impl FetchError {
    fn from_reqwest(url: &str, budget: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                budget,
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Returns why `body` looks like an anti-bot page, if it does.
pub fn detect_block(status: StatusCode, body: &str) -> Option<BlockReason> {
    let lower = body.to_ascii_lowercase();
    if let Some(sig) = BLOCK_SIGNATURES.iter().find(|sig| lower.contains(**sig)) {
        return Some(BlockReason::Signature((*sig).to_string()));
    }
    if BLOCK_STATUSES.contains(&status.as_u16()) && !body.trim().is_empty() {
        return Some(BlockReason::Status(status.as_u16()));
    }
    None
}

pub struct PageFetcher {
    client: reqwest::Client,
    renderer: Option<Arc<dyn Renderer>>,
    render_budget_factor: f64,
    render_grace: Duration,
}

impl PageFetcher {
    pub fn new(config: FetcherConfig, renderer: Option<Arc<dyn Renderer>>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .default_headers(config.profile.header_map()?)
            .build()
            .context("building reqwest client")?;
        let factor = config.render_budget_factor;
        Ok(Self {
            client,
            renderer,
            render_budget_factor: if factor.is_finite() && factor > 0.0 { factor } else { 1.0 },
            render_grace: config.render_grace,
        })
    }

    /// Fetch budget scaled by the factor, capped at [`MAX_RENDER_BUDGET`].
    pub fn render_budget(&self, budget: Duration) -> Duration {
        Duration::try_from_secs_f64(budget.as_secs_f64() * self.render_budget_factor)
            .unwrap_or(MAX_RENDER_BUDGET)
            .min(MAX_RENDER_BUDGET)
    }

    /// Fetches `url` within `budget`, escalating to the renderer when the body is blocked.
    pub async fn fetch(&self, url: &str, budget: Duration) -> Result<FetchOutcome, FetchError> {
        let scrape_id = Uuid::new_v4();
        let span = info_span!("http_fetch", %scrape_id, url);
        async move {
            let raw = self.fetch_raw(url, budget).await?;
            self.settle(url, raw, budget).await
        }
        .instrument(span)
        .await
    }

    async fn fetch_raw(&self, url: &str, budget: Duration) -> Result<RawResponse, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(budget)
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(url, budget, err))?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|err| FetchError::from_reqwest(url, budget, err))?;
        info!(status = status.as_u16(), bytes = body.len(), "fetched page");
        Ok(RawResponse {
            status,
            final_url,
            body,
        })
    }

    /// Decides what HTML extraction should see for an already-received response.
    ///
    /// A blocked body is never passed through: it is replaced by the rendered page,
    /// or by an empty document when no renderer is configured.
    pub async fn settle(
        &self,
        url: &str,
        raw: RawResponse,
        budget: Duration,
    ) -> Result<FetchOutcome, FetchError> {
        let status = raw.status.as_u16();
        let Some(reason) = detect_block(raw.status, &raw.body) else {
            let path = if raw.status.is_success() {
                FetchPath::Direct
            } else {
                warn!(status, "error status; continuing with degraded body");
                FetchPath::Degraded { status }
            };
            return Ok(FetchOutcome {
                html: raw.body,
                status,
                final_url: raw.final_url,
                path,
            });
        };

        warn!(%reason, status, "blocked response");
        let Some(renderer) = &self.renderer else {
            return Ok(FetchOutcome {
                html: String::new(),
                status,
                final_url: raw.final_url,
                path: FetchPath::BlockedWithoutRenderer(reason),
            });
        };

        let render_budget = self.render_budget(budget);
        let guard = render_budget.saturating_add(self.render_grace);
        let html = match tokio::time::timeout(guard, renderer.render(url, render_budget)).await {
            Ok(rendered) => rendered?,
            Err(_) => return Err(RenderError::Timeout(render_budget).into()),
        };
        if detect_block(StatusCode::OK, &html).is_some() {
            warn!("rendered page still carries a block signature");
        }
        Ok(FetchOutcome {
            html,
            status,
            final_url: raw.final_url,
            path: FetchPath::Rendered(reason),
        })
    }
}
