pub mod batch_analyze;
pub mod pipeline;

pub use batch_analyze::analyze_menu;
pub use pipeline::{run_scrape, PipelineOptions, ScrapeOutcome, ScrapeReport, ScrapeTarget};
