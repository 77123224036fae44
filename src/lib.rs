pub mod analytics;
pub mod api;
pub mod core;
pub mod listing;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use crate::core::error::ScrapeError;
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;
