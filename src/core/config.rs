use std::path::Path;
use std::time::Duration;

use crate::analytics::DEFAULT_TOP_N;
use crate::scraping::SessionMode;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (dish-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const DEFAULT_SEARCH_URL: &str = "https://www.swiggy.com/search";
pub const DEFAULT_API_MARKER: &str = "v3?";
pub const DEFAULT_IMAGE_CDN_PREFIX: &str =
    "https://media-assets.swiggy.com/swiggy/image/upload/fl_lossy,f_auto,q_auto,w_208,h_208,c_fit/";
pub const DEFAULT_REPLAY_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 30_000;
/// Room left for replay and mapping once a capture has used its whole budget.
pub const ITEM_TIMEOUT_MARGIN: Duration = Duration::from_secs(15);

pub const DEFAULT_LAT: &str = "28.65420";
pub const DEFAULT_LNG: &str = "77.23730";
pub const DEFAULT_ITEM: &str = "Biryani";

/// Where the platform lives and how its internal search call is recognised.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct PlatformConfig {
    /// Public search page the browser navigates to; the query goes in `?query=`.
    pub search_url: Option<String>,
    /// Substring that identifies the internal search API request.
    pub api_marker: Option<String>,
    /// CDN prefix prepended to a dish `imageId` for display.
    pub image_cdn_prefix: Option<String>,
    /// User-Agent sent on replay in place of the headless browser's own.
    pub replay_user_agent: Option<String>,
}

impl PlatformConfig {
    /// Search page: JSON field → `DISH_SCOUT_SEARCH_URL` → swiggy.com search.
    pub fn resolve_search_url(&self) -> String {
        resolve_string(&self.search_url, "DISH_SCOUT_SEARCH_URL", DEFAULT_SEARCH_URL)
    }

    /// API marker: JSON field → `DISH_SCOUT_API_MARKER` → `v3?`.
    pub fn resolve_api_marker(&self) -> String {
        resolve_string(&self.api_marker, "DISH_SCOUT_API_MARKER", DEFAULT_API_MARKER)
    }

    /// Image CDN prefix: JSON field → `DISH_SCOUT_IMAGE_CDN` → platform CDN.
    pub fn resolve_image_cdn_prefix(&self) -> String {
        resolve_string(
            &self.image_cdn_prefix,
            "DISH_SCOUT_IMAGE_CDN",
            DEFAULT_IMAGE_CDN_PREFIX,
        )
    }

    /// Replay UA: JSON field → `DISH_SCOUT_REPLAY_UA` → desktop Chrome on macOS.
    pub fn resolve_replay_user_agent(&self) -> String {
        resolve_string(
            &self.replay_user_agent,
            "DISH_SCOUT_REPLAY_UA",
            DEFAULT_REPLAY_USER_AGENT,
        )
    }
}

/// Browser-side capture tuning.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct CaptureConfig {
    /// Upper bound for one capture (navigation + network idle). Default: 30 000 ms.
    pub timeout_ms: Option<u64>,
    /// Network must stay idle this long before capture gives up waiting. Default: 500 ms.
    pub quiet_ms: Option<u64>,
    /// `"shared"` (one long-lived browser) or `"fresh"` (browser per capture).
    pub session_mode: Option<String>,
}

impl CaptureConfig {
    /// Capture timeout: JSON field → `DISH_SCOUT_CAPTURE_TIMEOUT_MS` → 30 000.
    pub fn resolve_timeout_ms(&self) -> u64 {
        resolve_number(
            self.timeout_ms,
            "DISH_SCOUT_CAPTURE_TIMEOUT_MS",
            DEFAULT_CAPTURE_TIMEOUT_MS,
        )
    }

    /// Quiet window: JSON field → `DISH_SCOUT_CAPTURE_QUIET_MS` → 500.
    pub fn resolve_quiet_ms(&self) -> u64 {
        resolve_number(self.quiet_ms, "DISH_SCOUT_CAPTURE_QUIET_MS", 500)
    }

    /// Session mode: JSON field → `DISH_SCOUT_SESSION_MODE` → shared.
    ///
    /// Unknown values fall back to [`SessionMode::Shared`].
    pub fn resolve_session_mode(&self) -> SessionMode {
        let raw = resolve_string(&self.session_mode, "DISH_SCOUT_SESSION_MODE", "shared");
        SessionMode::parse(&raw).unwrap_or_else(|| {
            tracing::warn!("unknown session mode '{}', using shared", raw);
            SessionMode::Shared
        })
    }
}

/// Fallback values for the HTTP query parameters.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct DefaultsConfig {
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub item: Option<String>,
}

impl DefaultsConfig {
    pub fn resolve_lat(&self) -> String {
        resolve_string(&self.lat, "DISH_SCOUT_DEFAULT_LAT", DEFAULT_LAT)
    }

    pub fn resolve_lng(&self) -> String {
        resolve_string(&self.lng, "DISH_SCOUT_DEFAULT_LNG", DEFAULT_LNG)
    }

    pub fn resolve_item(&self) -> String {
        resolve_string(&self.item, "DISH_SCOUT_DEFAULT_ITEM", DEFAULT_ITEM)
    }
}

/// Menu-wide fan-out limits.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct BatchConfig {
    /// Items analysed concurrently. Default: 4.
    pub max_concurrent: Option<usize>,
    /// Per-item budget covering capture, replay and analysis. Default: 90 s.
    pub item_timeout_secs: Option<u64>,
}

impl BatchConfig {
    /// Concurrency: JSON field → `DISH_SCOUT_BATCH_CONCURRENCY` → 4 (never below 1).
    pub fn resolve_max_concurrent(&self) -> usize {
        resolve_number(self.max_concurrent, "DISH_SCOUT_BATCH_CONCURRENCY", 4).max(1)
    }

    /// Item budget: JSON field → `DISH_SCOUT_BATCH_ITEM_TIMEOUT_SECS` → 90.
    pub fn resolve_item_timeout_secs(&self) -> u64 {
        resolve_number(
            self.item_timeout_secs,
            "DISH_SCOUT_BATCH_ITEM_TIMEOUT_SECS",
            90,
        )
    }
}

/// Top-level config loaded from `dish-scout.json`.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Size of the top-rated display subset. Default: [`DEFAULT_TOP_N`].
    pub top_n: Option<usize>,
}

impl ScoutConfig {
    /// Top-N size: JSON field → `DISH_SCOUT_TOP_N` → [`DEFAULT_TOP_N`].
    pub fn resolve_top_n(&self) -> usize {
        resolve_number(self.top_n, "DISH_SCOUT_TOP_N", DEFAULT_TOP_N)
    }

    /// Per-item batch budget, never shorter than one full capture plus
    /// [`ITEM_TIMEOUT_MARGIN`]. A shorter budget would cut every slow capture
    /// off before it can report "no match".
    pub fn resolve_item_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.batch.resolve_item_timeout_secs());
        let floor = Duration::from_millis(self.capture.resolve_timeout_ms()) + ITEM_TIMEOUT_MARGIN;
        if configured < floor {
            tracing::debug!(
                "batch item timeout {:?} is below capture budget, using {:?}",
                configured,
                floor
            );
        }
        configured.max(floor)
    }
}

/// Load `dish-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `DISH_SCOUT_CONFIG` env var path
/// 2. `./dish-scout.json`
/// 3. `../dish-scout.json`
///
/// Missing file → `ScoutConfig::default()` (silent, all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("dish-scout.json"),
        std::path::PathBuf::from("../dish-scout.json"),
    ];
    if let Ok(env_path) = std::env::var("DISH_SCOUT_CONFIG") {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<ScoutConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("dish-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "dish-scout.json parse error at {}: {} (using defaults)",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}

fn resolve_string(field: &Option<String>, env_key: &str, default: &str) -> String {
    if let Some(v) = field {
        if !v.trim().is_empty() {
            return v.trim().to_string();
        }
    }
    std::env::var(env_key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn resolve_number<T: std::str::FromStr>(field: Option<T>, env_key: &str, default: T) -> T {
    if let Some(n) = field {
        return n;
    }
    std::env::var(env_key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ---------------------------------------------------------------------------

pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

/// Optional override for the Chromium-family browser executable.
///
/// Default behavior is **auto-discovery** (see `scraping::browser_manager::find_chrome_executable()`).
/// This function only returns a value when `CHROME_EXECUTABLE` is set to an existing path.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fields_win_over_defaults() {
        let cfg: ScoutConfig = serde_json::from_str(
            r#"{
                "platform": { "api_marker": "v4?", "search_url": "http://localhost:9/search" },
                "capture": { "timeout_ms": 1500, "session_mode": "fresh" },
                "batch": { "max_concurrent": 0 },
                "top_n": 3
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.platform.resolve_api_marker(), "v4?");
        assert_eq!(cfg.platform.resolve_search_url(), "http://localhost:9/search");
        assert_eq!(cfg.capture.resolve_timeout_ms(), 1500);
        assert_eq!(cfg.capture.resolve_session_mode(), SessionMode::FreshPerCall);
        assert_eq!(cfg.batch.resolve_max_concurrent(), 1);
        assert_eq!(cfg.resolve_top_n(), 3);
    }

    #[test]
    fn blank_string_fields_fall_through() {
        let field = Some("   ".to_string());
        assert_eq!(
            resolve_string(&field, "DISH_SCOUT_TEST_UNSET_KEY", "fallback"),
            "fallback"
        );
    }

    #[test]
    fn empty_document_parses_to_defaults() {
        let cfg: ScoutConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.platform.search_url.is_none());
        assert!(cfg.capture.timeout_ms.is_none());
        assert!(cfg.top_n.is_none());
    }

    #[test]
    fn item_timeout_covers_a_full_capture() {
        let cfg: ScoutConfig = serde_json::from_str(
            r#"{ "capture": { "timeout_ms": 45000 }, "batch": { "item_timeout_secs": 5 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.resolve_item_timeout(), Duration::from_secs(60));

        let roomy: ScoutConfig = serde_json::from_str(
            r#"{ "capture": { "timeout_ms": 30000 }, "batch": { "item_timeout_secs": 120 } }"#,
        )
        .unwrap();
        assert_eq!(roomy.resolve_item_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn top_n_defaults_to_the_display_size() {
        let cfg = ScoutConfig {
            top_n: None,
            ..ScoutConfig::default()
        };
        if std::env::var("DISH_SCOUT_TOP_N").is_err() {
            assert_eq!(cfg.resolve_top_n(), DEFAULT_TOP_N);
        }
    }
}
