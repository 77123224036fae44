//! Shared fixtures: search API payloads and a capture stand-in.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use dish_scout::core::config::ScoutConfig;
use dish_scout::scraping::{CapturedRequestTemplate, RequestCapture, SessionMode};
use dish_scout::{AppState, ScrapeError};

pub const SEARCH_PATH: &str = "/dapi/restaurants/search/v3";

pub fn dish_card(restaurant: &str, price: i64, rating: &str) -> Value {
    dish_card_with_counts(restaurant, price, rating, "1.1K+ ratings", "1.1K")
}

pub fn dish_card_with_counts(
    restaurant: &str,
    price: i64,
    rating: &str,
    count: &str,
    count_v2: &str,
) -> Value {
    json!({
        "card": { "card": {
            "@type": "type.googleapis.com/swiggy.presentation.food.v2.Dish",
            "info": {
                "name": "Hyderabadi Biryani",
                "imageId": format!("{}/dish", restaurant.to_lowercase()),
                "price": price,
                "ratings": { "aggregatedRating": {
                    "rating": rating,
                    "ratingCount": count,
                    "ratingCountV2": count_v2
                } }
            },
            "restaurant": { "info": {
                "name": restaurant,
                "locality": "Chandni Chowk",
                "avgRating": 4.2,
                "sla": { "deliveryTime": 28, "lastMileTravel": 3.1 }
            } }
        } }
    })
}

pub fn scenario_a_cards() -> Vec<Value> {
    vec![
        dish_card("Karim's", 100, "4.5"),
        dish_card("Al Jawahar", 200, "4.0"),
        dish_card("Haji Shabrati", 300, "3.5"),
    ]
}

fn dish_group(cards: Vec<Value>) -> Value {
    json!({ "groupedCard": { "cardGroupMap": { "DISH": { "cards": cards } } } })
}

/// Dish collection at `data.cards[1]`.
pub fn primary_response(cards: Vec<Value>) -> Value {
    json!({
        "statusCode": 0,
        "data": { "cards": [
            { "card": { "card": { "id": "search_tabs" } } },
            dish_group(cards)
        ] }
    })
}

/// Dish collection moved to `data.cards[3]`.
pub fn shifted_response(cards: Vec<Value>) -> Value {
    json!({
        "statusCode": 0,
        "data": { "cards": [
            { "card": { "card": { "id": "search_tabs" } } },
            { "card": { "card": { "id": "filters" } } },
            { "card": { "card": { "id": "banner" } } },
            dish_group(cards)
        ] }
    })
}

/// Stands in for the browser: answers every capture with a template
/// pointing at `base_url`, unless the term is listed as unmatched or failing.
pub struct StubCapture {
    base_url: String,
    unmatched: Vec<String>,
    failing: Vec<String>,
    pub calls: AtomicUsize,
}

impl StubCapture {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            unmatched: Vec::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unmatched(mut self, term: &str) -> Self {
        self.unmatched.push(term.to_string());
        self
    }

    pub fn failing(mut self, term: &str) -> Self {
        self.failing.push(term.to_string());
        self
    }
}

#[async_trait]
impl RequestCapture for StubCapture {
    async fn capture(
        &self,
        query: &str,
        _mode: SessionMode,
    ) -> Result<Option<CapturedRequestTemplate>, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|t| t == query) {
            return Err(ScrapeError::Capture("navigation to search page failed".into()));
        }
        if self.unmatched.iter().any(|t| t == query) {
            return Ok(None);
        }

        let mut headers = BTreeMap::new();
        headers.insert(":authority".to_string(), "www.swiggy.com".to_string());
        headers.insert("accept".to_string(), "application/json".to_string());
        headers.insert("x-csrf-token".to_string(), "csrf-123".to_string());
        headers.insert("user-agent".to_string(), "HeadlessChrome/132.0".to_string());

        Ok(Some(CapturedRequestTemplate::new(
            format!(
                "{}{}?lat=28.6&lng=77.2&str={}&trackingId=trk-1&submitAction=ENTER",
                self.base_url, SEARCH_PATH, query
            ),
            "GET",
            headers,
        )))
    }
}

pub fn test_state(capture: StubCapture) -> Arc<AppState> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("failed to build test client");
    Arc::new(AppState::with_capture(
        client,
        Arc::new(capture),
        ScoutConfig::default(),
    ))
}
