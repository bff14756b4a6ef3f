//! Storage key constants.

/// Storage keys used by the background process.
///
/// The vault and the admission controller use disjoint keys so they never
/// contend with each other.
pub struct StorageKeys;

impl StorageKeys {
    /// API credential (tagged envelope, or an untagged pre-envelope string)
    pub const API_KEY: &'static str = "api_key";

    /// Prefix for per-category rate window timestamps (JSON array of ms)
    pub const RATE_LIMIT_PREFIX: &'static str = "rate_limit.";

    /// Storage key holding the rate window for one category.
    pub fn rate_limit(category: &str) -> String {
        format!("{}{}", Self::RATE_LIMIT_PREFIX, category)
    }
}
