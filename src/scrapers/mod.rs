pub mod immobiliare;
pub mod traits;
pub mod types;

pub use immobiliare::ImmobiliareClient;
pub use traits::ListingsApi;

/// In-memory API used by stage tests
#[cfg(test)]
pub mod testing {
    use super::ListingsApi;
    use crate::models::LocationKey;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned responses keyed by (location, page); unknown pages fail like a dropped connection
    #[derive(Default)]
    pub struct CannedApi {
        pub pages: HashMap<(LocationKey, u32), String>,
        pub places: HashMap<String, Value>,
        pub calls: AtomicUsize,
    }

    impl CannedApi {
        pub fn with_page(mut self, key: &LocationKey, page: u32, body: impl Into<String>) -> Self {
            self.pages.insert((key.clone(), page), body.into());
            self
        }

        pub fn with_place(mut self, place: &str, answer: Value) -> Self {
            self.places.insert(place.to_string(), answer);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListingsApi for CannedApi {
        async fn search_page(&self, key: &LocationKey, page: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(&(key.clone(), page))
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection reset for {} page {}", key.city_prefix(), page))
        }

        async fn autocomplete(&self, place: &str) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.places
                .get(place)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("lookup failed for {}", place))
        }

        fn source_name(&self) -> &'static str {
            "canned"
        }
    }
}
