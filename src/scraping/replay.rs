//! Reissues a captured search call over plain HTTPS with our own location
//! and search term, without the browser.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use tracing::{debug, info, warn};
use url::Url;

use super::capture::CapturedRequestTemplate;
use crate::core::error::ScrapeError;

/// Captured headers the HTTP client must own itself.
const HOP_HEADERS: &[&str] = &["host", "content-length", "connection", "accept-encoding"];

/// Values substituted into the captured query string.
#[derive(Debug, Clone)]
pub struct ReplayParams {
    pub lat: String,
    pub lng: String,
    pub term: String,
}

/// Rewrite `lat`, `lng` and `str` in the template URL, keeping every other
/// query parameter in its original order. Missing ones are appended.
pub fn build_replay_url(template_url: &str, params: &ReplayParams) -> Result<Url, ScrapeError> {
    let mut url = Url::parse(template_url)
        .map_err(|e| ScrapeError::Network(format!("captured url is invalid: {}", e)))?;

    let overrides = [
        ("lat", params.lat.as_str()),
        ("lng", params.lng.as_str()),
        ("str", params.term.as_str()),
    ];
    let mut seen = [false; 3];

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            match overrides.iter().position(|(name, _)| *name == k) {
                Some(i) => {
                    seen[i] = true;
                    (k.into_owned(), overrides[i].1.to_string())
                }
                None => (k.into_owned(), v.into_owned()),
            }
        })
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &pairs {
            query.append_pair(k, v);
        }
        for (i, (name, value)) in overrides.iter().enumerate() {
            if !seen[i] {
                query.append_pair(name, value);
            }
        }
    }

    Ok(url)
}

/// Captured headers minus pseudo-headers and hop headers, with the
/// browser's User-Agent replaced.
pub fn build_replay_headers(template: &CapturedRequestTemplate, user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in template.headers() {
        if name.starts_with(':') {
            continue;
        }
        let lower = name.to_ascii_lowercase();
        if HOP_HEADERS.contains(&lower.as_str()) || lower == "user-agent" {
            continue;
        }
        match (
            HeaderName::from_bytes(lower.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(n), Ok(v)) => {
                headers.insert(n, v);
            }
            _ => debug!("Skipping unrepresentable header '{}'", name),
        }
    }
    if let Ok(ua) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    headers
}

/// GET the rewritten search call and parse its body as JSON.
///
/// The captured method is ignored: the search API is a GET and replaying a
/// preflight or POST verb would not return results.
pub async fn replay(
    client: &reqwest::Client,
    template: &CapturedRequestTemplate,
    params: &ReplayParams,
    user_agent: &str,
) -> Result<serde_json::Value, ScrapeError> {
    let url = build_replay_url(template.url(), params)?;
    if !template.method().eq_ignore_ascii_case("GET") {
        debug!("Captured method {} replayed as GET", template.method());
    }

    info!("📡 Replaying search call for '{}'", params.term);
    let response = client
        .get(url.as_str())
        .headers(build_replay_headers(template, user_agent))
        .send()
        .await
        .map_err(|e| ScrapeError::Network(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ScrapeError::Network(format!("failed to read body: {}", e)))?;

    if !status.is_success() {
        if body.trim().is_empty() {
            return Err(ScrapeError::Network(format!("search API returned {}", status)));
        }
        warn!("Search API returned {} with a body, attempting to parse", status);
    }

    serde_json::from_str(&body).map_err(|e| ScrapeError::ResponseParse(e.to_string()))
}
