use thiserror::Error;

/// Failures that escalate out of a single scrape invocation.
///
/// A missing search-API request (`NoMatch`) and an empty card set are not
/// errors; see [`crate::tools::pipeline::ScrapeOutcome`].
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser session manager is shut down")]
    ShutDown,

    #[error("request capture failed: {0}")]
    Capture(String),

    #[error("search API request failed: {0}")]
    Network(String),

    #[error("failed to parse search API response: {0}")]
    ResponseParse(String),
}

impl ScrapeError {
    /// Stable label reported to HTTP callers so they can tell which stage failed.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Launch(_) | ScrapeError::ShutDown => "LaunchError",
            ScrapeError::Capture(_) => "CaptureError",
            ScrapeError::Network(_) => "NetworkError",
            ScrapeError::ResponseParse(_) => "ResponseParseError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_pipeline_stages() {
        assert_eq!(ScrapeError::Launch("x".into()).kind(), "LaunchError");
        assert_eq!(ScrapeError::ShutDown.kind(), "LaunchError");
        assert_eq!(ScrapeError::Capture("x".into()).kind(), "CaptureError");
        assert_eq!(ScrapeError::Network("x".into()).kind(), "NetworkError");
        assert_eq!(
            ScrapeError::ResponseParse("x".into()).kind(),
            "ResponseParseError"
        );
    }

    #[test]
    fn parse_error_keeps_underlying_message() {
        let err = ScrapeError::ResponseParse("expected value at line 1 column 1".into());
        assert!(err.to_string().contains("expected value at line 1 column 1"));
    }
}
