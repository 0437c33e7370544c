use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use thiserror::Error;
use tokio::task;
use tracing::{debug, info};

use crate::fetch::{BrowserProfile, MAX_RENDER_BUDGET};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("launching browser: {0}")]
    Launch(String),
    #[error("navigating to {url}: {message}")]
    Navigate { url: String, message: String },
    #[error("reading rendered content: {0}")]
    Content(String),
    #[error("render exceeded budget of {0:?}")]
    Timeout(Duration),
    #[error("render task aborted: {0}")]
    Join(#[from] task::JoinError),
}

/// Full browser rendering of a page that plain HTTP could not retrieve.
///
/// Implementations own their browser session for the duration of one call and
/// must release it before returning, whatever the outcome.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str, budget: Duration) -> Result<String, RenderError>;
}

/// Headless Chrome renderer. Launches one browser per call.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    user_agent: String,
    accept_language: String,
    settle_poll: Duration,
}

impl ChromeRenderer {
    pub fn new(profile: &BrowserProfile) -> Self {
        Self {
            user_agent: profile.user_agent.clone(),
            accept_language: profile.accept_language.clone(),
            settle_poll: Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str, budget: Duration) -> Result<String, RenderError> {
        let this = self.clone();
        let url = url.to_string();
        task::spawn_blocking(move || this.render_blocking(&url, budget)).await?
    }
}

/// `start + budget`, falling back to the capped budget when the sum does not fit.
fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .or_else(|| start.checked_add(MAX_RENDER_BUDGET))
        .unwrap_or(start)
}

/// Whether another sleep-then-snapshot round finishes a full poll before `deadline`.
fn room_for_poll(now: Instant, poll: Duration, deadline: Instant) -> bool {
    deadline.saturating_duration_since(now) > poll.saturating_mul(2)
}

impl ChromeRenderer {
    fn render_blocking(&self, url: &str, budget: Duration) -> Result<String, RenderError> {
        let budget = budget.min(MAX_RENDER_BUDGET);
        let deadline = deadline_after(Instant::now(), budget);
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .idle_browser_timeout(budget)
            .build()
            .map_err(|err| RenderError::Launch(err.to_string()))?;

        // Dropping `browser` kills the Chrome process, so every return below tears it down.
        let browser = Browser::new(options).map_err(|err| RenderError::Launch(format!("{err:#}")))?;
        let tab = browser
            .new_tab()
            .map_err(|err| RenderError::Launch(format!("{err:#}")))?;
        tab.set_default_timeout(deadline.saturating_duration_since(Instant::now()));
        tab.set_user_agent(&self.user_agent, Some(&self.accept_language), None)
            .map_err(|err| RenderError::Launch(format!("{err:#}")))?;

        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|err| RenderError::Navigate {
                url: url.to_string(),
                message: format!("{err:#}"),
            })?;

        let mut html = tab
            .get_content()
            .map_err(|err| RenderError::Content(format!("{err:#}")))?;

        // Network quiescence, approximated as two identical snapshots; best effort,
        // and the last round ends a poll interval before the deadline.
        while room_for_poll(Instant::now(), self.settle_poll, deadline) {
            std::thread::sleep(self.settle_poll);
            let next = match tab.get_content() {
                Ok(next) => next,
                Err(err) => {
                    debug!(error = %format!("{err:#}"), "content poll failed; keeping last snapshot");
                    break;
                }
            };
            let settled = next == html;
            html = next;
            if settled {
                break;
            }
        }

        info!(url, bytes = html.len(), "rendered page");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_never_overflows() {
        let start = Instant::now();
        assert_eq!(deadline_after(start, Duration::from_secs(5)), start + Duration::from_secs(5));
        assert_eq!(deadline_after(start, Duration::MAX), start + MAX_RENDER_BUDGET);
    }

    #[test]
    fn polling_stops_a_poll_interval_short_of_the_deadline() {
        let now = Instant::now();
        let poll = Duration::from_millis(500);
        assert!(room_for_poll(now, poll, now + Duration::from_millis(1500)));
        assert!(!room_for_poll(now, poll, now + Duration::from_millis(1000)));
        assert!(!room_for_poll(now, poll, now + Duration::from_millis(700)));
        assert!(!room_for_poll(now + Duration::from_secs(1), poll, now));
    }
}
