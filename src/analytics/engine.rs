//! Price aggregates over canonical records.

use serde::Serialize;

use crate::core::types::js_number;
use crate::listing::CanonicalRecord;

/// A record projected down for min/max reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub name: String,
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    pub locality: String,
    pub delivery_time: String,
    pub avg_rating: String,
}

impl From<&CanonicalRecord> for PricePoint {
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            name: record.restaurant_name.clone(),
            price: record.price,
            locality: record.locality.clone(),
            delivery_time: record.delivery_time.clone(),
            avg_rating: record.restaurant_avg_rating.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRating {
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    #[serde(serialize_with = "js_number")]
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceDistance {
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    #[serde(serialize_with = "js_number")]
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub min: Option<PricePoint>,
    pub max: Option<PricePoint>,
    #[serde(serialize_with = "js_number")]
    pub avg_price: f64,
    #[serde(rename = "priceVSrating")]
    pub price_vs_rating: Vec<PriceRating>,
    #[serde(rename = "priceVSdistance")]
    pub price_vs_distance: Vec<PriceDistance>,
}

impl AnalyticsResult {
    pub fn empty() -> Self {
        Self {
            min: None,
            max: None,
            avg_price: 0.0,
            price_vs_rating: Vec::new(),
            price_vs_distance: Vec::new(),
        }
    }
}

/// One pass over the records. Only strictly positive prices count towards
/// min, max and the mean; on equal prices the first record seen is kept.
pub fn analyze(records: &[CanonicalRecord]) -> AnalyticsResult {
    let mut min: Option<&CanonicalRecord> = None;
    let mut max: Option<&CanonicalRecord> = None;
    let mut total = 0.0;
    let mut priced = 0usize;
    let mut price_vs_rating = Vec::new();
    let mut price_vs_distance = Vec::new();

    for record in records {
        let price = record.price;
        if !(price.is_finite() && price > 0.0) {
            continue;
        }

        if min.map_or(true, |m| price < m.price) {
            min = Some(record);
        }
        if max.map_or(true, |m| price > m.price) {
            max = Some(record);
        }
        total += price;
        priced += 1;

        if record.aggregated_rating.is_finite() {
            price_vs_rating.push(PriceRating {
                price,
                rating: record.aggregated_rating,
            });
        }
        price_vs_distance.push(PriceDistance {
            price,
            distance: record.last_mile_travel,
        });
    }

    AnalyticsResult {
        min: min.map(PricePoint::from),
        max: max.map(PricePoint::from),
        avg_price: if priced > 0 { total / priced as f64 } else { 0.0 },
        price_vs_rating,
        price_vs_distance,
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::listing::CanonicalRecord;

    pub fn record(name: &str, price: f64, rating: f64) -> CanonicalRecord {
        CanonicalRecord {
            restaurant_name: name.to_string(),
            image_id: format!("{name}-img"),
            price,
            locality: "Karol Bagh".to_string(),
            delivery_time: "30".to_string(),
            restaurant_avg_rating: "4.2".to_string(),
            aggregated_rating: rating,
            rating_count: 50.0,
            rating_count_v2: 50.0,
            last_mile_travel: 1.5,
            extras: None,
        }
    }
}
