//! Own menu price vs. competitor average.

use serde::Serialize;

use crate::core::types::js_number;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceComparison {
    /// Major currency units, as listed on the caller's menu.
    #[serde(serialize_with = "js_number")]
    pub menu_price: f64,
    /// Competitor average converted from minor to major units.
    #[serde(serialize_with = "js_number")]
    pub competitor_avg_price: f64,
    #[serde(serialize_with = "js_number")]
    pub price_difference: f64,
    /// Rounded to two decimals; 0 when there is no competitor average.
    #[serde(serialize_with = "js_number")]
    pub percentage_difference: f64,
    pub is_more_expensive: bool,
    pub is_less_expensive: bool,
    pub is_price_match: bool,
}

/// `avg_price_minor` is the analytics `avgPrice` (paise, cents...).
pub fn compare_price(menu_price: f64, avg_price_minor: f64) -> PriceComparison {
    let menu_price = if menu_price.is_finite() { menu_price } else { 0.0 };
    let competitor_avg_price = if avg_price_minor.is_finite() {
        avg_price_minor / 100.0
    } else {
        0.0
    };
    let price_difference = menu_price - competitor_avg_price;
    let percentage_difference = if competitor_avg_price > 0.0 {
        ((price_difference / competitor_avg_price) * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    PriceComparison {
        menu_price,
        competitor_avg_price,
        price_difference,
        percentage_difference,
        is_more_expensive: price_difference > 0.0,
        is_less_expensive: price_difference < 0.0,
        is_price_match: price_difference.abs() < 0.01,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn more_expensive_than_market() {
        let c = compare_price(300.0, 25000.0);
        assert_eq!(c.competitor_avg_price, 250.0);
        assert_eq!(c.price_difference, 50.0);
        assert_eq!(c.percentage_difference, 20.0);
        assert!(c.is_more_expensive && !c.is_less_expensive && !c.is_price_match);
    }

    #[test]
    fn cheaper_with_rounding() {
        let c = compare_price(199.0, 29900.0);
        assert_eq!(c.percentage_difference, -33.44);
        assert!(c.is_less_expensive);
    }

    #[test]
    fn price_match_within_a_paisa() {
        let c = compare_price(250.005, 25000.0);
        assert!(c.is_price_match);
        assert!(c.is_more_expensive);
    }

    #[test]
    fn no_competitor_average() {
        let c = compare_price(120.0, 0.0);
        assert_eq!(c.percentage_difference, 0.0);
        assert_eq!(c.price_difference, 120.0);
    }
}
