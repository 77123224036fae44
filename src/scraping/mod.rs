pub mod browser_manager;
pub mod capture;
pub mod replay;

pub use browser_manager::{
    BrowserSessionManager, ChromeLauncher, ChromeSession, CloseOnDrop, SessionManager,
};
pub use capture::{CapturedRequestTemplate, ChromeCapture, RequestCapture};
pub use replay::{replay, ReplayParams};

/// How the capture step obtains its browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// One long-lived browser shared by every capture; a fresh tab per call.
    #[default]
    Shared,
    /// A dedicated browser launched for one capture and closed right after.
    FreshPerCall,
}

impl SessionMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "shared" | "with_shared_session" => Some(SessionMode::Shared),
            "fresh" | "fresh_per_call" | "fresh_browser_per_call" => Some(SessionMode::FreshPerCall),
            _ => None,
        }
    }
}
