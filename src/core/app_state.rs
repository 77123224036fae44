use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{load_scout_config, ScoutConfig};
use crate::scraping::{BrowserSessionManager, ChromeCapture, ChromeLauncher, RequestCapture};

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    /// Discovers the search call; headless Chromium in production.
    pub capture: Arc<dyn RequestCapture>,
    /// Present when `capture` is browser-backed; shut down with the server.
    pub sessions: Option<Arc<BrowserSessionManager>>,
    /// File-based config loaded from `dish-scout.json` (env-var fallback for all fields).
    pub config: Arc<ScoutConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("browser_backed", &self.sessions.is_some())
            .field(
                "browser_ready",
                &self.sessions.as_ref().is_some_and(|s| s.is_ready()),
            )
            .finish()
    }
}

impl AppState {
    /// Production state: config from disk, one lazily launched browser.
    pub fn new(http_client: reqwest::Client) -> Self {
        let config = Arc::new(load_scout_config());
        let capture_timeout = Duration::from_millis(config.capture.resolve_timeout_ms());
        let sessions = BrowserSessionManager::new(ChromeLauncher::new(capture_timeout));
        let capture: Arc<dyn RequestCapture> =
            Arc::new(ChromeCapture::new(Arc::clone(&sessions), &config));
        Self {
            http_client,
            capture,
            sessions: Some(sessions),
            config,
        }
    }

    /// State with a caller-supplied capture and no browser to manage.
    pub fn with_capture(
        http_client: reqwest::Client,
        capture: Arc<dyn RequestCapture>,
        config: ScoutConfig,
    ) -> Self {
        Self {
            http_client,
            capture,
            sessions: None,
            config: Arc::new(config),
        }
    }

    /// Close the shared browser, if any. Later captures fail with `ShutDown`.
    pub async fn shutdown(&self) {
        if let Some(sessions) = &self.sessions {
            sessions.shutdown().await;
        }
    }
}
