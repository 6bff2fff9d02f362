use crate::models::LocationKey;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Common trait for the search API backing the pipeline
/// Stages only talk to this trait, so tests can swap in canned responses
#[async_trait]
pub trait ListingsApi: Send + Sync {
    /// Fetch one page of listings for `key` and return the raw response body
    async fn search_page(&self, key: &LocationKey, page: u32) -> Result<String>;

    /// Resolve a free-text place name to candidate locations
    async fn autocomplete(&self, place: &str) -> Result<Value>;

    /// Get the name of the listings source
    fn source_name(&self) -> &'static str;
}
