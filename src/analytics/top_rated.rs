//! Top-rated subset for display, independent of the aggregates.

use serde::Serialize;

use crate::core::types::js_number;
use crate::listing::{CanonicalRecord, DishExtras};

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSignals {
    #[serde(serialize_with = "js_number")]
    pub rating: f64,
    #[serde(serialize_with = "js_number")]
    pub rating_count: f64,
    #[serde(serialize_with = "js_number")]
    pub rating_count_v2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopRatedCard {
    pub name: String,
    pub image_url: String,
    #[serde(serialize_with = "js_number")]
    pub price: f64,
    pub ratings: RatingSignals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dish: Option<DishExtras>,
}

/// Highest `aggregated_rating` first, at most `n` cards. Equal ratings keep
/// their input order; a non-finite rating ranks as 0.
pub fn top_rated(records: &[CanonicalRecord], n: usize, image_cdn_prefix: &str) -> Vec<TopRatedCard> {
    let rating = |r: &CanonicalRecord| {
        if r.aggregated_rating.is_finite() {
            r.aggregated_rating
        } else {
            0.0
        }
    };

    let mut ranked: Vec<&CanonicalRecord> = records.iter().collect();
    ranked.sort_by(|a, b| rating(b).total_cmp(&rating(a)));

    ranked
        .into_iter()
        .take(n)
        .map(|r| TopRatedCard {
            name: r.restaurant_name.clone(),
            image_url: format!("{}{}", image_cdn_prefix, r.image_id),
            price: r.price,
            ratings: RatingSignals {
                rating: r.aggregated_rating,
                rating_count: r.rating_count,
                rating_count_v2: r.rating_count_v2,
            },
            dish: r.extras.clone(),
        })
        .collect()
}
