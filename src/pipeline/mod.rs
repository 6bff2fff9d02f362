pub mod aggregate;
pub mod download;
pub mod flatten;
pub mod index;
pub mod table_builder;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Settings;
use crate::models::MacrozoneSummary;
use crate::scrapers::ListingsApi;
use crate::storage::{read_index_table, RunLayout};

/// Probe, download, flatten and summarize in one pass
pub async fn run_pipeline(
    settings: &Settings,
    api: Arc<dyn ListingsApi>,
) -> Result<Vec<MacrozoneSummary>> {
    let layout = RunLayout::new(&settings.data_root, &settings.run_date);
    let rows = read_index_table(&settings.index_table)?;

    let outcome = index::build_work_items(Arc::clone(&api), rows, settings.probe_workers).await;
    download::download_listings(
        api,
        outcome.items,
        &layout.json_dir,
        settings.download_workers,
    )
    .await?;

    flatten::compile_city_tables(&layout.json_dir, &layout.csv_dir)?;
    let summaries = aggregate::compile_summary_table(
        &layout.csv_dir,
        &layout.summary_path(),
        settings.outlier_quantile,
    )?;

    info!("✅ Run {} complete", settings.run_date);
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexRow;
    use crate::scrapers::testing::CannedApi;
    use crate::storage::write_index_table;
    use serde_json::json;
    use tempfile::tempdir;

    fn listing(id: u64, price: u64, surface: &str) -> serde_json::Value {
        json!({
            "realEstate": {
                "id": id,
                "price": { "value": price },
                "properties": [{
                    "surface": surface,
                    "location": { "city": "Milano", "macrozone": "Centro" }
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let dir = tempdir().unwrap();
        let row = IndexRow {
            region_name: "Lombardia".to_string(),
            region_id: "lom".to_string(),
            province_name: "Milano".to_string(),
            province_id: "MI".to_string(),
            city_name: "Milano".to_string(),
            city_id: 8042,
            macrozone_name: "Centro".to_string(),
            macrozone_keyurl: "centro".to_string(),
            macrozone_id: 10061,
            neighbourhood_name: "Brera".to_string(),
            neighbourhood_id: 12809,
        };
        let settings = Settings {
            data_root: dir.path().to_path_buf(),
            run_date: "261018".to_string(),
            index_table: dir.path().join("index_table.csv"),
            ..Settings::default()
        };
        write_index_table(&settings.index_table, &[row.clone()]).unwrap();

        let first = json!({
            "results": [listing(1, 100, "10 m²"), listing(2, 200, "10 m²")],
            "maxPages": 2
        })
        .to_string();
        let second = json!({
            "results": [listing(3, 300, "10 m²")],
            "maxPages": 2
        })
        .to_string();
        let api: Arc<dyn ListingsApi> = Arc::new(
            CannedApi::default()
                .with_page(&row.key(), 1, first)
                .with_page(&row.key(), 2, second),
        );

        let summaries = run_pipeline(&settings, api).await.unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].macrozone_name, "Centro");
        assert_eq!(summaries[0].price.mean, 200.0);
        assert_eq!(summaries[0].price.min, 100.0);
        assert_eq!(summaries[0].price.max, 300.0);

        let layout = RunLayout::new(dir.path(), "261018");
        assert!(layout.json_dir.join("lom_MI_8042_10061_12809_2.json").exists());
        assert!(layout.csv_dir.join("lom_MI_8042.csv").exists());
        assert!(layout.summary_path().exists());
    }
}
