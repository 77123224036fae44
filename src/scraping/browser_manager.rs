//! Native browser management using `chromiumoxide`.
//!
//! This module owns:
//! * Finding a usable Chromium-family executable.
//! * Building the headless launch config.
//! * [`CloseOnDrop`]: closing tabs and browsers of cancelled captures.
//! * `SessionManager`: one long-lived browser per process, launched lazily
//!   with single-flight semantics and closed explicitly via `shutdown()`.
//!
//! Captures never touch the `Browser` directly: they ask the manager for the
//! shared [`ChromeSession`] and open their own tab on it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use rand::distr::{Distribution, Uniform};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::error::ScrapeError;

// ── Realistic User-Agent pool ────────────────────────────────────────────────

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen realistic desktop User-Agent string.
///
/// Only Chromium-family agents: the platform's web client serves a different
/// bundle (and a different search call) to Firefox/Safari.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    match Uniform::new(0usize, DESKTOP_USER_AGENTS.len()) {
        Ok(dist) => DESKTOP_USER_AGENTS[dist.sample(&mut rng)],
        Err(_) => DESKTOP_USER_AGENTS[0],
    }
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Names looked up in every `PATH` directory.
const PATH_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

#[cfg(target_os = "linux")]
const INSTALL_PATHS: &[&str] = &["/usr/bin/chromium", "/snap/bin/chromium", "/opt/google/chrome/chrome"];
#[cfg(target_os = "macos")]
const INSTALL_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];
#[cfg(target_os = "windows")]
const INSTALL_PATHS: &[&str] = &[r"C:\Program Files\Google\Chrome\Application\chrome.exe"];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const INSTALL_PATHS: &[&str] = &[];

/// `CHROME_EXECUTABLE`, then `PATH`, then the usual install location.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = crate::core::config::chrome_executable_override() {
        return Some(p);
    }

    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default();
    dirs.iter()
        .flat_map(|dir| PATH_CANDIDATES.iter().map(move |exe| dir.join(exe)))
        .chain(INSTALL_PATHS.iter().map(PathBuf::from))
        .find(|candidate| candidate.is_file())
        .map(|found| found.to_string_lossy().into_owned())
}

// ── Headless browser config builder ──────────────────────────────────────────

/// chromiumoxide's own default for a CDP command round-trip.
const DEFAULT_CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CDP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// CDP command timeout for a browser that serves captures of `capture_timeout`.
///
/// The handler evicts any command older than this, `Page.navigate` included,
/// so it must outlast the capture deadline or slow pages fail as errors
/// instead of ending in "no match".
pub fn cdp_request_timeout(capture_timeout: Duration) -> Duration {
    (capture_timeout + CDP_TIMEOUT_MARGIN).max(DEFAULT_CDP_REQUEST_TIMEOUT)
}

/// Headless config with a randomized desktop UA.
///
/// `--no-sandbox` keeps container deployments working;
/// `AutomationControlled` is disabled to hide `navigator.webdriver`.
pub fn build_headless_config(
    exe: &str,
    width: u32,
    height: u32,
    request_timeout: Duration,
) -> Result<BrowserConfig> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .request_timeout(request_timeout)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--no-first-run")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", random_user_agent()))
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Cleanup on cancellation ──────────────────────────────────────────────────

type CloseFn<T> = Box<dyn FnOnce(T) -> BoxFuture<'static, ()> + Send>;

/// Runs an async close for a browser resource when dropped.
///
/// A capture future can be dropped at any `.await` (batch item timeout,
/// client disconnect), so tabs and throwaway browsers are closed from here
/// rather than from the end of the happy path. The guard holds its own
/// handle; callers keep using theirs.
pub struct CloseOnDrop<T: Send + 'static> {
    pending: Option<(T, CloseFn<T>)>,
}

impl<T: Send + 'static> CloseOnDrop<T> {
    pub fn new<F>(handle: T, close: F) -> Self
    where
        F: FnOnce(T) -> BoxFuture<'static, ()> + Send + 'static,
    {
        Self {
            pending: Some((handle, Box::new(close))),
        }
    }

    /// Close now and wait for it.
    pub async fn close(mut self) {
        if let Some((handle, close)) = self.pending.take() {
            close(handle).await;
        }
    }
}

impl<T: Send + 'static> Drop for CloseOnDrop<T> {
    fn drop(&mut self) {
        let Some((handle, close)) = self.pending.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!("closing browser resource of an abandoned capture");
                runtime.spawn(close(handle));
            }
            Err(_) => warn!("no runtime left to close a browser resource"),
        }
    }
}

// ── Launcher seam ────────────────────────────────────────────────────────────

/// Starts and stops whatever "session" the manager hands out.
///
/// Production uses [`ChromeLauncher`]; tests plug in a counter.
#[async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    async fn launch(&self) -> std::result::Result<Self::Session, String>;

    async fn close(&self, session: &Self::Session);
}

/// A running headless Chromium plus the task draining its CDP event stream.
pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler: tokio::task::JoinHandle<()>,
}

impl ChromeSession {
    /// Open a blank tab. The caller owns the page and must close it.
    pub async fn new_page(&self) -> std::result::Result<Page, ScrapeError> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(ScrapeError::ShutDown)?;
        browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::Capture(format!("failed to open tab: {}", e)))
    }

    /// Number of tabs currently open in this browser.
    pub async fn open_tabs(&self) -> std::result::Result<usize, ScrapeError> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(ScrapeError::ShutDown)?;
        browser
            .pages()
            .await
            .map(|pages| pages.len())
            .map_err(|e| ScrapeError::Capture(format!("failed to list tabs: {}", e)))
    }

    async fn close(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }
        self.handler.abort();
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Launches headless Chromium with [`build_headless_config`].
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    width: u32,
    height: u32,
    request_timeout: Duration,
}

impl ChromeLauncher {
    /// Launcher for captures bounded by `capture_timeout`. The executable is
    /// discovered at launch time (see [`find_chrome_executable`]).
    pub fn new(capture_timeout: Duration) -> Self {
        Self {
            width: 1366,
            height: 900,
            request_timeout: cdp_request_timeout(capture_timeout),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> std::result::Result<ChromeSession, String> {
        let exe = find_chrome_executable().ok_or_else(|| {
            "No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE.".to_string()
        })?;

        info!("🚀 Launching headless browser ({})", exe);
        let config = build_headless_config(&exe, self.width, self.height, self.request_timeout)
            .map_err(|e| e.to_string())?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| format!("failed to launch ({}): {}", exe, e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        Ok(ChromeSession {
            browser: Mutex::new(Some(browser)),
            handler,
        })
    }

    async fn close(&self, session: &ChromeSession) {
        session.close().await;
    }
}

// ── Session manager (single-flight launch) ───────────────────────────────────

type PendingLaunch<S> = Shared<BoxFuture<'static, std::result::Result<Arc<S>, String>>>;

enum SessionState<S> {
    Idle,
    Launching {
        generation: u64,
        pending: PendingLaunch<S>,
    },
    Ready(Arc<S>),
    ShutDown,
}

/// Owns the process-wide session.
///
/// * The first `acquire()` launches; callers arriving while that launch is in
///   flight await the same outcome instead of launching again.
/// * A failed launch resets the manager so the next `acquire()` retries.
/// * After `shutdown()` starts, every `acquire()` reports
///   [`ScrapeError::ShutDown`]; nothing is relaunched.
///
/// Store it behind an `Arc` in `AppState` so all handlers share one instance.
pub struct SessionManager<L: SessionLauncher> {
    launcher: Arc<L>,
    state: std::sync::Mutex<SessionState<L::Session>>,
    next_generation: AtomicU64,
}

pub type BrowserSessionManager = SessionManager<ChromeLauncher>;

impl<L: SessionLauncher> SessionManager<L> {
    /// Create a manager. Nothing is launched until the first `acquire()`.
    pub fn new(launcher: L) -> Arc<Self> {
        Arc::new(Self {
            launcher: Arc::new(launcher),
            state: std::sync::Mutex::new(SessionState::Idle),
            next_generation: AtomicU64::new(0),
        })
    }

    pub fn launcher(&self) -> &Arc<L> {
        &self.launcher
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState<L::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the shared session, launching it if needed.
    pub async fn acquire(&self) -> std::result::Result<Arc<L::Session>, ScrapeError> {
        let (generation, pending) = {
            let mut state = self.lock_state();
            match &*state {
                SessionState::Ready(session) => return Ok(Arc::clone(session)),
                SessionState::ShutDown => return Err(ScrapeError::ShutDown),
                SessionState::Launching {
                    generation,
                    pending,
                } => (*generation, pending.clone()),
                SessionState::Idle => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let launcher = Arc::clone(&self.launcher);
                    let pending = async move { launcher.launch().await.map(Arc::new) }
                        .boxed()
                        .shared();
                    *state = SessionState::Launching {
                        generation,
                        pending: pending.clone(),
                    };
                    (generation, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut state = self.lock_state();
        let still_ours = matches!(
            &*state,
            SessionState::Launching { generation: g, .. } if *g == generation
        );
        match outcome {
            Ok(session) => {
                if still_ours {
                    info!("Browser session ready");
                    *state = SessionState::Ready(Arc::clone(&session));
                } else if matches!(&*state, SessionState::ShutDown) {
                    return Err(ScrapeError::ShutDown);
                }
                Ok(session)
            }
            Err(e) => {
                if still_ours {
                    warn!("Browser launch failed, manager reset for retry: {}", e);
                    *state = SessionState::Idle;
                }
                Err(ScrapeError::Launch(e))
            }
        }
    }

    /// Close the session (if any) and refuse further `acquire()` calls.
    ///
    /// Idempotent. A launch still in flight is awaited and then closed.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), SessionState::ShutDown);
        let session = match previous {
            SessionState::Ready(session) => Some(session),
            SessionState::Launching { pending, .. } => pending.await.ok(),
            SessionState::Idle | SessionState::ShutDown => None,
        };
        if let Some(session) = session {
            self.launcher.close(&session).await;
            info!("🛑 Browser session shut down");
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock_state(), SessionState::Ready(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(&*self.lock_state(), SessionState::ShutDown)
    }
}
