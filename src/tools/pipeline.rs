//! capture → replay → normalize → map → analyze, for one search term.

use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analytics::{analyze, top_rated, AnalyticsResult, TopRatedCard};
use crate::core::config::{DefaultsConfig, ScoutConfig};
use crate::core::error::ScrapeError;
use crate::core::types::{AnalyticsBody, ScrapeQuery, ScrapeResponse};
use crate::listing::{locate_cards, map_cards, CardSource, FieldSet, MapOptions, MapReport};
use crate::scraping::{replay, ReplayParams, SessionMode};
use crate::AppState;

/// Behaviour switches for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub session_mode: SessionMode,
    pub quality_gate: bool,
    pub fields: FieldSet,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::Shared,
            quality_gate: true,
            fields: FieldSet::Core,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &ScoutConfig) -> Self {
        Self {
            session_mode: config.capture.resolve_session_mode(),
            ..Self::default()
        }
    }

    /// Apply `mode`, `gate` and `fields` query overrides; unknown values keep
    /// the configured behaviour.
    pub fn with_query(mut self, query: &ScrapeQuery) -> Self {
        if let Some(mode) = query.mode.as_deref().and_then(SessionMode::parse) {
            self.session_mode = mode;
        }
        if let Some(gate) = query.gate {
            self.quality_gate = gate;
        }
        if let Some(fields) = query.fields.as_deref().and_then(FieldSet::parse) {
            self.fields = fields;
        }
        self
    }
}

/// Search term plus the location to search from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub item: String,
    pub lat: String,
    pub lng: String,
}

impl ScrapeTarget {
    /// Fill blanks from the configured defaults.
    pub fn resolve(
        config: &ScoutConfig,
        item: Option<&str>,
        lat: Option<&str>,
        lng: Option<&str>,
    ) -> Self {
        let pick = |value: Option<&str>, fallback: fn(&DefaultsConfig) -> String| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback(&config.defaults))
        };
        Self {
            item: pick(item, DefaultsConfig::resolve_item),
            lat: pick(lat, DefaultsConfig::resolve_lat),
            lng: pick(lng, DefaultsConfig::resolve_lng),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub scrape_id: Uuid,
    pub card_source: Option<CardSource>,
    pub mapped: MapReport,
    pub analytics: AnalyticsResult,
    pub top_rated: Vec<TopRatedCard>,
    pub duration_ms: u64,
}

impl ScrapeReport {
    /// No record survived structural and quality filtering.
    pub fn is_empty(&self) -> bool {
        self.mapped.records.is_empty()
    }

    pub fn into_response(self) -> ScrapeResponse {
        if self.is_empty() {
            return ScrapeResponse::empty();
        }
        ScrapeResponse {
            analytics: AnalyticsBody::Full(self.analytics),
            cards: self.top_rated,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    /// The search page never issued the search API call.
    NoMatch,
    Completed(ScrapeReport),
}

pub async fn run_scrape(
    state: &AppState,
    target: &ScrapeTarget,
    options: &PipelineOptions,
) -> Result<ScrapeOutcome, ScrapeError> {
    let scrape_id = Uuid::new_v4();
    let span = info_span!("scrape", %scrape_id, item = %target.item);
    run_scrape_inner(state, target, options, scrape_id)
        .instrument(span)
        .await
}

async fn run_scrape_inner(
    state: &AppState,
    target: &ScrapeTarget,
    options: &PipelineOptions,
    scrape_id: Uuid,
) -> Result<ScrapeOutcome, ScrapeError> {
    let start = Instant::now();
    info!(
        "Scrape started (lat={}, lng={}, mode={:?})",
        target.lat, target.lng, options.session_mode
    );

    let Some(template) = state.capture.capture(&target.item, options.session_mode).await? else {
        warn!("Search API request not observed");
        return Ok(ScrapeOutcome::NoMatch);
    };

    let params = ReplayParams {
        lat: target.lat.clone(),
        lng: target.lng.clone(),
        term: target.item.clone(),
    };
    let user_agent = state.config.platform.resolve_replay_user_agent();
    let response = replay(&state.http_client, &template, &params, &user_agent).await?;

    let located = locate_cards(&response);
    let card_source = located.map(|list| list.source);
    let cards = located.map(|list| list.cards).unwrap_or_default();
    if let Some(CardSource::Fallback(idx)) = card_source {
        info!("Dish cards found by scan at group {}", idx);
    }

    let mapped = map_cards(
        cards,
        &MapOptions {
            quality_gate: options.quality_gate,
            fields: options.fields,
        },
    );
    let analytics = analyze(&mapped.records);
    let top = top_rated(
        &mapped.records,
        state.config.resolve_top_n(),
        &state.config.platform.resolve_image_cdn_prefix(),
    );

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Scrape finished in {}ms: {} cards, {} kept ({} non-dish, {} malformed, {} unrated)",
        duration_ms,
        cards.len(),
        mapped.records.len(),
        mapped.dropped_structural,
        mapped.dropped_malformed,
        mapped.dropped_quality
    );

    Ok(ScrapeOutcome::Completed(ScrapeReport {
        scrape_id,
        card_source,
        mapped,
        analytics,
        top_rated: top,
        duration_ms,
    }))
}
