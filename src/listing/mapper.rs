//! Card classification and projection into [`CanonicalRecord`]s.
//!
//! Upstream mixes dish cards with ads, banners and filter widgets in the
//! same array. Each card is classified first ([`CardKind`]) and only dish
//! cards are read. A leaf that is absent becomes `""`/`0`; a leaf that is
//! present with the wrong JSON shape is a [`CardError`] and drops that card
//! alone.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::js_number;

/// Which fields to project from a dish card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSet {
    #[default]
    Core,
    /// Core fields plus [`DishExtras`].
    Extended,
}

impl FieldSet {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "core" | "default" => Some(FieldSet::Core),
            "extended" | "full" => Some(FieldSet::Extended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MapOptions {
    /// Drop records with a zero rating, rating count or rating-count variant.
    pub quality_gate: bool,
    pub fields: FieldSet,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            quality_gate: true,
            fields: FieldSet::Core,
        }
    }
}

/// A dish listing flattened out of one raw card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub restaurant_name: String,
    pub image_id: String,
    /// Minor currency units, never negative.
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    pub locality: String,
    pub delivery_time: String,
    pub restaurant_avg_rating: String,
    #[serde(serialize_with = "js_number")]
    pub aggregated_rating: f64,
    #[serde(serialize_with = "js_number")]
    pub rating_count: f64,
    #[serde(serialize_with = "js_number")]
    pub rating_count_v2: f64,
    #[serde(serialize_with = "js_number")]
    pub last_mile_travel: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<DishExtras>,
}

impl CanonicalRecord {
    pub fn passes_quality_gate(&self) -> bool {
        self.aggregated_rating != 0.0 && self.rating_count != 0.0 && self.rating_count_v2 != 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DishExtras {
    pub dish_name: String,
    pub is_veg: bool,
    pub category: String,
    pub restaurant_id: String,
    pub cuisines: Vec<String>,
    pub cost_for_two: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardError {
    #[error("field `{field}` is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Result of classifying one raw card.
#[derive(Debug, Clone, Copy)]
pub enum CardKind<'a> {
    Dish {
        info: &'a Value,
        restaurant: &'a Value,
    },
    Other,
}

pub fn classify(raw: &Value) -> CardKind<'_> {
    let Some(card) = raw.pointer("/card/card") else {
        return CardKind::Other;
    };
    let is_dish = card
        .get("@type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.contains("Dish"));
    let info = card.get("info").filter(|v| v.is_object());
    let restaurant = card.pointer("/restaurant/info").filter(|v| v.is_object());

    match (is_dish, info, restaurant) {
        (true, Some(info), Some(restaurant)) => CardKind::Dish { info, restaurant },
        _ => CardKind::Other,
    }
}

/// Outcome of [`map_cards`]. The four counts always add up to the input length.
#[derive(Debug, Clone, Default)]
pub struct MapReport {
    pub records: Vec<CanonicalRecord>,
    /// Not a dish card (ads, banners, filters).
    pub dropped_structural: usize,
    pub dropped_malformed: usize,
    pub dropped_quality: usize,
}

impl MapReport {
    pub fn input_count(&self) -> usize {
        self.records.len() + self.dropped_structural + self.dropped_malformed + self.dropped_quality
    }
}

pub fn map_cards(cards: &[Value], options: &MapOptions) -> MapReport {
    let mut report = MapReport::default();

    for (idx, raw) in cards.iter().enumerate() {
        let CardKind::Dish { info, restaurant } = classify(raw) else {
            report.dropped_structural += 1;
            continue;
        };

        let record = match map_dish(info, restaurant, options.fields) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping card {}: {}", idx, e);
                report.dropped_malformed += 1;
                continue;
            }
        };

        if options.quality_gate && !record.passes_quality_gate() {
            debug!("Card {} ({}) has no rating signal", idx, record.restaurant_name);
            report.dropped_quality += 1;
            continue;
        }

        report.records.push(record);
    }

    report
}

pub fn map_dish(
    info: &Value,
    restaurant: &Value,
    fields: FieldSet,
) -> Result<CanonicalRecord, CardError> {
    let price = number_at(info, "/price")?;

    let extras = match fields {
        FieldSet::Core => None,
        FieldSet::Extended => Some(DishExtras {
            dish_name: text_at(info, "/name")?,
            is_veg: flag_at(info, "/isVeg"),
            category: text_at(info, "/category")?,
            restaurant_id: text_at(restaurant, "/id")?,
            cuisines: restaurant
                .get("cuisines")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            cost_for_two: text_at(restaurant, "/costForTwo")?,
        }),
    };

    Ok(CanonicalRecord {
        restaurant_name: text_at(restaurant, "/name")?,
        image_id: text_at(info, "/imageId")?,
        price: if price.is_finite() && price > 0.0 { price } else { 0.0 },
        locality: text_at(restaurant, "/locality")?,
        delivery_time: text_at(restaurant, "/sla/deliveryTime")?,
        restaurant_avg_rating: text_at(restaurant, "/avgRating")?,
        aggregated_rating: number_at(info, "/ratings/aggregatedRating/rating")?,
        rating_count: number_at(info, "/ratings/aggregatedRating/ratingCount")?,
        rating_count_v2: number_at(info, "/ratings/aggregatedRating/ratingCountV2")?,
        last_mile_travel: number_at(restaurant, "/sla/lastMileTravel")?,
        extras,
    })
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn malformed(field: &'static str, expected: &str, found: &Value) -> CardError {
    CardError::Malformed {
        field,
        reason: format!("expected {}, found {}", expected, shape_of(found)),
    }
}

fn text_at(obj: &Value, field: &'static str) -> Result<String, CardError> {
    match obj.pointer(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(malformed(field, "text", other)),
    }
}

fn number_at(obj: &Value, field: &'static str) -> Result<f64, CardError> {
    match obj.pointer(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => Ok(parse_lenient_number(s)),
        Some(other) => Err(malformed(field, "number", other)),
    }
}

fn flag_at(obj: &Value, field: &'static str) -> bool {
    match obj.pointer(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// Parses strings like `"4.3"`, `"120 ratings"` and `"1.2K+ ratings"`.
/// Anything without a leading number is `0`.
pub fn parse_lenient_number(raw: &str) -> f64 {
    let s = raw.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(s.len(), |(i, _)| i);
    let Ok(base) = s[..end].parse::<f64>() else {
        return 0.0;
    };
    let scale = match s[end..].chars().next() {
        Some('K' | 'k') => 1e3,
        Some('M' | 'm') => 1e6,
        _ => 1.0,
    };
    let value = base * scale;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
