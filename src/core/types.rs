use serde::{Deserialize, Serialize};

use crate::analytics::{AnalyticsResult, PriceComparison, TopRatedCard};

/// Query string of `GET /scrape`.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ScrapeQuery {
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default, alias = "lng")]
    pub long: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    /// `core` (default) or `extended`.
    #[serde(default)]
    pub fields: Option<String>,
    /// `false` disables the rating quality gate.
    #[serde(default)]
    pub gate: Option<bool>,
    /// `shared` or `fresh`; overrides the configured session mode.
    #[serde(default)]
    pub mode: Option<String>,
}

/// `{}` when nothing survived filtering, the full aggregates otherwise.
#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum AnalyticsBody {
    Full(AnalyticsResult),
    Empty {},
}

#[derive(Debug, Serialize, Clone)]
pub struct ScrapeResponse {
    pub analytics: AnalyticsBody,
    pub cards: Vec<TopRatedCard>,
}

impl ScrapeResponse {
    pub fn empty() -> Self {
        Self {
            analytics: AnalyticsBody::Empty {},
            cards: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Pipeline stage that failed (`CaptureError`, `NetworkError`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// A JSON value callers send either as a number or as a string.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    pub fn as_f64(&self) -> f64 {
        match self {
            NumberOrText::Number(n) if n.is_finite() => *n,
            NumberOrText::Number(_) => 0.0,
            NumberOrText::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_param(&self) -> String {
        match self {
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct MenuLocation {
    #[serde(default)]
    pub lat: Option<NumberOrText>,
    #[serde(default, alias = "lon", alias = "long")]
    pub lng: Option<NumberOrText>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MenuItemInput {
    pub name: String,
    /// Major currency units.
    #[serde(default)]
    pub price: Option<NumberOrText>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Body of `POST /analyze/menu`.
#[derive(Debug, Deserialize, Clone)]
pub struct MenuAnalysisRequest {
    #[serde(default)]
    pub location: Option<MenuLocation>,
    pub items: Vec<MenuItemInput>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ItemAnalysis {
    pub item_name: String,
    #[serde(serialize_with = "js_number")]
    pub menu_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// `null` when the item could not be scraped.
    pub analysis: Option<AnalyticsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PriceComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MenuAnalysisResponse {
    pub items: Vec<ItemAnalysis>,
    pub analyzed: usize,
    pub failed: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Writes an `f64` the way the platform's JSON does: whole values as
/// integers (`24900`, not `24900.0`), everything else unchanged.
pub fn js_number<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
