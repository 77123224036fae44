pub mod compare;
pub mod engine;
pub mod top_rated;

pub use compare::{compare_price, PriceComparison};
pub use engine::{analyze, AnalyticsResult, PriceDistance, PricePoint, PriceRating};
pub use top_rated::{top_rated, RatingSignals, TopRatedCard, DEFAULT_TOP_N};
