//! Best-effort fan-out download of listing pages to disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::WorkItem;
use crate::scrapers::ListingsApi;
use crate::storage::ensure_directory;

/// What a download pass achieved
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: usize,
    pub failed: Vec<(WorkItem, String)>,
}

async fn download_page(api: &dyn ListingsApi, item: &WorkItem, json_dir: &Path) -> Result<PathBuf> {
    let body = api.search_page(&item.key, item.page).await?;

    serde_json::from_str::<serde_json::Value>(&body)
        .context("Response body is not JSON")?;

    let path = json_dir.join(item.file_name());
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Download every work item into `json_dir` with at most `workers` requests in flight.
///
/// Only the directory creation is fatal. A failing item is logged and reported,
/// and never stops its siblings.
pub async fn download_listings(
    api: Arc<dyn ListingsApi>,
    items: Vec<WorkItem>,
    json_dir: &Path,
    workers: usize,
) -> Result<DownloadReport> {
    ensure_directory(json_dir)?;

    info!(
        "Downloading {} pages into {} ({} workers)",
        items.len(),
        json_dir.display(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers.clamp(1, Semaphore::MAX_PERMITS)));
    let json_dir = Arc::new(json_dir.to_path_buf());
    let mut tasks = JoinSet::new();

    for item in items {
        let api = Arc::clone(&api);
        let semaphore = Arc::clone(&semaphore);
        let json_dir = Arc::clone(&json_dir);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let result = download_page(api.as_ref(), &item, &json_dir).await;
            (item, result)
        });
    }

    let mut report = DownloadReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(path))) => {
                debug!("Saved {}", path.display());
                report.saved += 1;
            }
            Ok((item, Err(e))) => {
                warn!("Exception occurred downloading {}: {:#}", item.file_name(), e);
                report.failed.push((item, format!("{:#}", e)));
            }
            Err(e) => warn!("Download task panicked: {}", e),
        }
    }

    info!(
        "💾 Saved {} pages, {} failed",
        report.saved,
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationKey;
    use crate::scrapers::testing::CannedApi;
    use tempfile::tempdir;

    fn key() -> LocationKey {
        LocationKey {
            region_id: "lom".to_string(),
            province_id: "MI".to_string(),
            city_id: 8042,
            macrozone_id: 10061,
            neighbourhood_id: 12809,
        }
    }

    #[tokio::test]
    async fn test_download_writes_raw_bodies_and_skips_failures() {
        let dir = tempdir().unwrap();
        let json_dir = dir.path().join("json");
        let body = r#"{"results": [], "maxPages": 3}"#;

        let api = CannedApi::default()
            .with_page(&key(), 1, body)
            .with_page(&key(), 2, "<html>rate limited</html>");
        let api: Arc<dyn ListingsApi> = Arc::new(api);

        let items = vec![
            WorkItem::new(key(), 1),
            WorkItem::new(key(), 2),
            WorkItem::new(key(), 3),
        ];
        let report = download_listings(api, items, &json_dir, 2).await.unwrap();

        assert_eq!(report.saved, 1);
        assert_eq!(report.failed.len(), 2);

        let saved = std::fs::read_to_string(json_dir.join("lom_MI_8042_10061_12809_1.json")).unwrap();
        assert_eq!(saved, body);
        assert!(!json_dir.join("lom_MI_8042_10061_12809_2.json").exists());
        assert!(!json_dir.join("lom_MI_8042_10061_12809_3.json").exists());
    }

    #[tokio::test]
    async fn test_download_issues_one_request_per_item() {
        let dir = tempdir().unwrap();
        let api = Arc::new(
            CannedApi::default()
                .with_page(&key(), 1, "{}")
                .with_page(&key(), 2, "{}"),
        );
        let shared: Arc<dyn ListingsApi> = api.clone();

        let items = vec![WorkItem::new(key(), 1), WorkItem::new(key(), 2)];
        let report = download_listings(shared, items, dir.path(), 10).await.unwrap();

        assert_eq!(report.saved, 2);
        assert_eq!(api.call_count(), 2);
    }

    #[tokio::test]
    async fn test_oversized_worker_count_is_capped() {
        let dir = tempdir().unwrap();
        let api: Arc<dyn ListingsApi> = Arc::new(CannedApi::default().with_page(&key(), 1, "{}"));

        let report = download_listings(api, vec![WorkItem::new(key(), 1)], dir.path(), usize::MAX)
            .await
            .unwrap();

        assert_eq!(report.saved, 1);
    }
}
