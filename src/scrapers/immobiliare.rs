use crate::config::Settings;
use crate::models::LocationKey;
use crate::scrapers::traits::ListingsApi;
use crate::scrapers::types::{autocomplete_query, SearchParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

const LISTINGS_PATH: &str = "/api-next/search-list/real-estates/";
const AUTOCOMPLETE_PATH: &str = "/search/autocomplete";

/// HTTP client for the immobiliare.it internal search API
#[derive(Clone)]
pub struct ImmobiliareClient {
    client: Client,
    base_url: String,
    params: SearchParams,
}

impl ImmobiliareClient {
    /// Build a client from run settings; the connection pool is shared by all clones
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36");
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            params: settings.search.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ListingsApi for ImmobiliareClient {
    async fn search_page(&self, key: &LocationKey, page: u32) -> Result<String> {
        let query = self.params.listing_query(key, page);

        let response = self
            .client
            .get(self.url(LISTINGS_PATH))
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} page {}", key.city_prefix(), page))?;

        debug!("GET {} -> {}", response.url(), response.status());

        if !response.status().is_success() {
            warn!("Listings endpoint returned status: {}", response.status());
            anyhow::bail!("Listings endpoint returned {}", response.status());
        }

        response.text().await.context("Failed to read response body")
    }

    async fn autocomplete(&self, place: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(AUTOCOMPLETE_PATH))
            .query(&autocomplete_query(place))
            .send()
            .await
            .with_context(|| format!("Failed to look up '{}'", place))?;

        if !response.status().is_success() {
            anyhow::bail!("Autocomplete returned {} for '{}'", response.status(), place);
        }

        response
            .json()
            .await
            .with_context(|| format!("Autocomplete answer for '{}' is not JSON", place))
    }

    fn source_name(&self) -> &'static str {
        "immobiliare.it"
    }
}
