//! Page-count discovery: one probe per index row, expanded into work items.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::{IndexRow, LocationKey, ProbeFailure, WorkItem};
use crate::scrapers::ListingsApi;

/// Page requested by the probe. The API answers page 0 with page 1's content,
/// so page 0 is never requested.
pub const PROBE_PAGE: u32 = 1;

#[derive(Debug, Deserialize)]
struct PageCount {
    #[serde(rename = "maxPages", default)]
    max_pages: Option<u32>,
}

/// Work items and failed probes from one discovery pass
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub items: Vec<WorkItem>,
    pub failures: Vec<ProbeFailure>,
}

/// One work item per page in `1..=max_pages`
pub fn expand_pages(key: &LocationKey, max_pages: u32) -> Vec<WorkItem> {
    (1..=max_pages)
        .map(|page| WorkItem::new(key.clone(), page))
        .collect()
}

/// Read `maxPages` from a listings response; a missing field counts as no pages
pub fn read_max_pages(body: &str) -> Result<u32> {
    let count: PageCount =
        serde_json::from_str(body).context("Response is not a listings JSON document")?;
    Ok(count.max_pages.unwrap_or(0))
}

async fn probe(api: &dyn ListingsApi, row: &IndexRow) -> Result<Vec<WorkItem>, ProbeFailure> {
    let key = row.key();
    let outcome = match api.search_page(&key, PROBE_PAGE).await {
        Ok(body) => read_max_pages(&body),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(max_pages) => {
            debug!(
                "{} {} {}: {} pages",
                row.city_name, row.macrozone_name, row.neighbourhood_name, max_pages
            );
            Ok(expand_pages(&key, max_pages))
        }
        Err(e) => Err(ProbeFailure {
            city_name: row.city_name.clone(),
            macrozone_name: row.macrozone_name.clone(),
            reason: format!("{:#}", e),
        }),
    }
}

/// Probe every row concurrently and collect the resulting work items.
///
/// `workers` caps concurrent probes; `None` lets every row run at once.
/// A failed probe never aborts the batch: it yields no items and one failure entry.
pub async fn build_work_items(
    api: Arc<dyn ListingsApi>,
    rows: Vec<IndexRow>,
    workers: Option<usize>,
) -> IndexOutcome {
    info!("Probing {} locations on {}", rows.len(), api.source_name());

    let permits = workers
        .unwrap_or(rows.len())
        .clamp(1, Semaphore::MAX_PERMITS);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    for row in rows {
        let api = Arc::clone(&api);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            probe(api.as_ref(), &row).await
        });
    }

    let mut outcome = IndexOutcome::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(items)) => outcome.items.extend(items),
            Ok(Err(failure)) => outcome.failures.push(failure),
            Err(e) => warn!("Probe task panicked: {}", e),
        }
    }

    info!("Built {} work items", outcome.items.len());
    if !outcome.failures.is_empty() {
        info!("Could not parse {} macrozones:", outcome.failures.len());
        for failure in &outcome.failures {
            info!(
                "{} {} ({})",
                failure.city_name, failure.macrozone_name, failure.reason
            );
        }
    }

    outcome
}
