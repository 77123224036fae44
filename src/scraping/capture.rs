//! Discovers the platform's internal search call by loading its public
//! search page in a headless tab and watching outgoing requests.
//!
//! Every request is paused by the Fetch domain and must be continued
//! explicitly, matching or not, otherwise navigation stalls. The tab (and,
//! per call, the browser) is closed even when the capture future is dropped.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::{fetch, network};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::browser_manager::{BrowserSessionManager, ChromeSession, CloseOnDrop, SessionLauncher};
use super::SessionMode;
use crate::core::config::ScoutConfig;
use crate::core::error::ScrapeError;

/// In-flight requests still tolerated while the page counts as idle.
const IDLE_MAX_IN_FLIGHT: usize = 2;
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Snapshot of one observed outbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedRequestTemplate {
    url: String,
    method: String,
    headers: BTreeMap<String, String>,
}

impl CapturedRequestTemplate {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// The seam between the pipeline and whatever observes the search call.
///
/// `Ok(None)` means the page finished (or the budget ran out) without the
/// search API being called. That is a normal outcome, not an error.
#[async_trait]
pub trait RequestCapture: Send + Sync {
    async fn capture(
        &self,
        query: &str,
        mode: SessionMode,
    ) -> Result<Option<CapturedRequestTemplate>, ScrapeError>;
}

/// `RequestCapture` backed by headless Chromium.
pub struct ChromeCapture {
    sessions: Arc<BrowserSessionManager>,
    search_url: String,
    api_marker: String,
    timeout: Duration,
    quiet: Duration,
}

impl ChromeCapture {
    pub fn new(sessions: Arc<BrowserSessionManager>, config: &ScoutConfig) -> Self {
        Self {
            sessions,
            search_url: config.platform.resolve_search_url(),
            api_marker: config.platform.resolve_api_marker(),
            timeout: Duration::from_millis(config.capture.resolve_timeout_ms()),
            quiet: Duration::from_millis(config.capture.resolve_quiet_ms()),
        }
    }

    /// Runs one capture in a fresh tab and closes the tab on every path.
    async fn capture_in_tab(
        &self,
        session: &ChromeSession,
        target: &Url,
    ) -> Result<Option<CapturedRequestTemplate>, ScrapeError> {
        let page = session.new_page().await?;
        let tab = CloseOnDrop::new(page.clone(), |page: Page| {
            async move {
                if let Err(e) = page.close().await {
                    warn!("Failed to close capture tab: {}", e);
                }
            }
            .boxed()
        });
        let outcome = watch_for_search_call(&page, target, &self.api_marker, self.timeout, self.quiet).await;
        tab.close().await;
        outcome
    }
}

#[async_trait]
impl RequestCapture for ChromeCapture {
    async fn capture(
        &self,
        query: &str,
        mode: SessionMode,
    ) -> Result<Option<CapturedRequestTemplate>, ScrapeError> {
        let target = build_search_url(&self.search_url, query)?;

        match mode {
            SessionMode::Shared => {
                let session = self.sessions.acquire().await?;
                self.capture_in_tab(&session, &target).await
            }
            SessionMode::FreshPerCall => {
                if self.sessions.is_shut_down() {
                    return Err(ScrapeError::ShutDown);
                }
                let launcher = Arc::clone(self.sessions.launcher());
                let session = Arc::new(launcher.launch().await.map_err(ScrapeError::Launch)?);
                let browser = CloseOnDrop::new(Arc::clone(&session), move |session: Arc<ChromeSession>| {
                    async move { launcher.close(&session).await }.boxed()
                });
                let outcome = self.capture_in_tab(&session, &target).await;
                browser.close().await;
                outcome
            }
        }
    }
}

/// `<search_url>?query=<term>` with the term form-encoded.
pub fn build_search_url(search_url: &str, query: &str) -> Result<Url, ScrapeError> {
    let mut url = Url::parse(search_url)
        .map_err(|e| ScrapeError::Capture(format!("invalid search url '{}': {}", search_url, e)))?;
    url.query_pairs_mut().append_pair("query", query);
    Ok(url)
}

pub fn is_search_api_request(url: &str, marker: &str) -> bool {
    !marker.is_empty() && url.contains(marker)
}

/// Flattens CDP's header object into name → value.
///
/// Non-string values are stringified; nulls are skipped.
pub fn headers_from_cdp(raw: &serde_json::Value) -> BTreeMap<String, String> {
    let Some(obj) = raw.as_object() else {
        return BTreeMap::new();
    };
    obj.iter()
        .filter_map(|(name, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.clone(), value))
        })
        .collect()
}

/// Tracks whether the page has settled: at most [`IDLE_MAX_IN_FLIGHT`]
/// requests outstanding for a continuous quiet window.
#[derive(Debug)]
struct NetworkIdle {
    in_flight: usize,
    quiet: Duration,
    idle_since: Option<Instant>,
}

impl NetworkIdle {
    fn new(quiet: Duration, now: Instant) -> Self {
        Self {
            in_flight: 0,
            quiet,
            idle_since: Some(now),
        }
    }

    fn started(&mut self) {
        self.in_flight += 1;
        if self.in_flight > IDLE_MAX_IN_FLIGHT {
            self.idle_since = None;
        }
    }

    fn settled(&mut self, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight <= IDLE_MAX_IN_FLIGHT && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.idle_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.quiet)
    }
}

/// A `Page.navigate` that outlives the CDP command timeout is a slow page,
/// not a broken one: the capture keeps listening until its own deadline.
fn navigation_is_fatal(error: &CdpError) -> bool {
    !matches!(error, CdpError::Timeout)
}

fn cdp_error(what: &'static str) -> impl Fn(chromiumoxide::error::CdpError) -> ScrapeError {
    move |e| ScrapeError::Capture(format!("{}: {}", what, e))
}

async fn watch_for_search_call(
    page: &Page,
    target: &Url,
    marker: &str,
    timeout: Duration,
    quiet: Duration,
) -> Result<Option<CapturedRequestTemplate>, ScrapeError> {
    let mut paused = page
        .event_listener::<fetch::EventRequestPaused>()
        .await
        .map_err(cdp_error("failed to subscribe to requestPaused"))?;
    let mut sent = page
        .event_listener::<network::EventRequestWillBeSent>()
        .await
        .map_err(cdp_error("failed to subscribe to requestWillBeSent"))?;
    let mut finished = page
        .event_listener::<network::EventLoadingFinished>()
        .await
        .map_err(cdp_error("failed to subscribe to loadingFinished"))?;
    let mut failed = page
        .event_listener::<network::EventLoadingFailed>()
        .await
        .map_err(cdp_error("failed to subscribe to loadingFailed"))?;

    page.execute(network::EnableParams::default())
        .await
        .map_err(cdp_error("failed to enable network events"))?;
    page.execute(fetch::EnableParams {
        patterns: Some(vec![fetch::RequestPattern {
            url_pattern: Some("*".to_string()),
            resource_type: None,
            request_stage: Some(fetch::RequestStage::Request),
        }]),
        handle_auth_requests: Some(false),
    })
    .await
    .map_err(cdp_error("failed to enable request interception"))?;

    let started_at = Instant::now();
    let deadline = started_at + timeout;
    let mut idle = NetworkIdle::new(quiet, started_at);
    let mut navigated = false;
    let mut loaded = false;

    info!("🌐 Capturing search call from {}", target);
    let navigation = page.goto(target.as_str());
    tokio::pin!(navigation);

    loop {
        tokio::select! {
            result = &mut navigation, if !navigated => {
                navigated = true;
                match result {
                    Ok(_) => {
                        loaded = true;
                        debug!("Search page loaded after {:?}", started_at.elapsed());
                    }
                    Err(e) if navigation_is_fatal(&e) => {
                        return Err(ScrapeError::Capture(format!("navigation to {} failed: {}", target, e)));
                    }
                    Err(e) => debug!("Navigation still pending ({}), waiting for the deadline", e),
                }
            }
            Some(event) = paused.next() => {
                let matched = is_search_api_request(&event.request.url, marker).then(|| {
                    CapturedRequestTemplate::new(
                        event.request.url.clone(),
                        event.request.method.clone(),
                        headers_from_cdp(event.request.headers.inner()),
                    )
                });
                let resume = page.execute(fetch::ContinueRequestParams::new(event.request_id.clone()));
                match tokio::time::timeout_at(deadline, resume).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!("continueRequest failed for {}: {}", event.request.url, e),
                    Err(_) => debug!("continueRequest for {} ran past the deadline", event.request.url),
                }
                if let Some(template) = matched {
                    info!("🎯 Search call captured after {:?}", started_at.elapsed());
                    return Ok(Some(template));
                }
            }
            Some(_) = sent.next() => idle.started(),
            Some(_) = finished.next() => idle.settled(Instant::now()),
            Some(_) = failed.next() => idle.settled(Instant::now()),
            _ = tokio::time::sleep_until(deadline) => {
                info!("⏱️ Capture budget of {:?} spent without a search call", timeout);
                return Ok(None);
            }
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }

        if loaded && idle.is_idle(Instant::now()) {
            info!("Network idle without a search call");
            return Ok(None);
        }
    }
}
