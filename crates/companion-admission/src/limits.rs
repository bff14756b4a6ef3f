//! Per-category rate limits.

use std::time::Duration;

/// Known action categories.
pub mod categories {
    /// Conversational completion calls.
    pub const CHAT_COMPLETION: &str = "chatCompletion";
    /// Model list and other metadata fetches.
    pub const FETCH_MODELS: &str = "fetchModels";
}

/// Cap on calls within a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum calls admitted within the window.
    pub max_calls: usize,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    /// Limit applied to categories not in the table.
    pub const DEFAULT: RateLimit = RateLimit::per_minute(30);

    /// `max_calls` per 60 seconds.
    pub const fn per_minute(max_calls: usize) -> Self {
        Self {
            max_calls,
            window: Duration::from_secs(60),
        }
    }

    /// Fixed limit for a category; unknown categories get [`RateLimit::DEFAULT`].
    pub fn for_category(category: &str) -> Self {
        match category {
            categories::CHAT_COMPLETION => Self::per_minute(10),
            categories::FETCH_MODELS => Self::per_minute(5),
            _ => Self::DEFAULT,
        }
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}
