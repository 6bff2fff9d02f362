//! Per-macrozone descriptive statistics over the city tables.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::models::{ListingRecord, MacrozoneSummary, MetricStats};
use crate::storage::{list_files, read_listings, write_summary};

/// Two-decimal rounding with ties to even, as pandas `DataFrame.round` does
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Quantile of already sorted values, interpolating linearly between closest ranks
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Full statistic set for one metric, rounded to two decimals; `None` for no values
pub fn describe(values: &[f64]) -> Option<MetricStats> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len() as f64;
    let mean = sorted.iter().sum::<f64>() / n;
    let std = (sorted.len() > 1).then(|| {
        let squares: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (n - 1.0)).sqrt()
    });
    let median = quantile(&sorted, 0.5)?;

    Some(MetricStats {
        mean: round2(mean),
        median: round2(median),
        std: std.map(round2),
        min: round2(sorted[0]),
        max: round2(sorted[sorted.len() - 1]),
        q50: round2(median),
        q90: round2(quantile(&sorted, 0.9)?),
    })
}

/// Drop listings whose price per sqm is at or above the `q` quantile of the table
pub fn trim_outliers(records: Vec<ListingRecord>, q: f64) -> Vec<ListingRecord> {
    let mut per_sqm: Vec<f64> = records.iter().filter_map(|r| r.price_per_sqm).collect();
    per_sqm.sort_by(f64::total_cmp);

    match quantile(&per_sqm, q) {
        Some(threshold) => records
            .into_iter()
            .filter(|r| r.price_per_sqm.is_some_and(|v| v < threshold))
            .collect(),
        None => records,
    }
}

/// Summary rows for one city's listings, one per macrozone
pub fn summarize_city(records: Vec<ListingRecord>, outlier_quantile: Option<f64>) -> Vec<MacrozoneSummary> {
    let mut records: Vec<ListingRecord> = records
        .into_iter()
        .filter(ListingRecord::has_required_metrics)
        .collect();
    if let Some(q) = outlier_quantile {
        records = trim_outliers(records, q);
    }

    let fallback_city = records
        .iter()
        .find_map(|r| r.city.clone())
        .unwrap_or_default();

    let mut groups: BTreeMap<(String, String), Vec<&ListingRecord>> = BTreeMap::new();
    for record in &records {
        let Some(macrozone) = record.macrozone.clone() else {
            continue;
        };
        let city = record.city.clone().unwrap_or_else(|| fallback_city.clone());
        groups.entry((city, macrozone)).or_default().push(record);
    }

    let mut summaries = Vec::with_capacity(groups.len());
    for ((city_name, macrozone_name), rows) in groups {
        let prices: Vec<f64> = rows.iter().filter_map(|r| r.price).collect();
        let per_sqm: Vec<f64> = rows.iter().filter_map(|r| r.price_per_sqm).collect();
        let surfaces: Vec<f64> = rows.iter().filter_map(|r| r.surface).map(|s| s as f64).collect();

        let (Some(price), Some(surface)) = (describe(&prices), describe(&surfaces)) else {
            continue;
        };
        let price_per_sqm = describe(&per_sqm);
        if price_per_sqm.is_none() {
            warn!("{} {}: no usable price per sqm", city_name, macrozone_name);
        }
        summaries.push(MacrozoneSummary {
            city_name,
            macrozone_name,
            price,
            price_per_sqm,
            surface,
        });
    }
    summaries
}

/// Summarize every city table in `csv_dir` and write the combined table to `out_path`
pub fn compile_summary_table(
    csv_dir: &Path,
    out_path: &Path,
    outlier_quantile: Option<f64>,
) -> Result<Vec<MacrozoneSummary>> {
    let tables = list_files(csv_dir, "csv")?;
    info!("Compiling macrozone summary table from {} cities", tables.len());

    let mut summaries = Vec::new();
    for table in &tables {
        let records = match read_listings(table) {
            Ok(records) => records,
            Err(e) => {
                warn!("Skipping city table: {:#}", e);
                continue;
            }
        };
        let rows = summarize_city(records, outlier_quantile);
        debug!("{}: {} macrozones", table.display(), rows.len());
        summaries.extend(rows);
    }

    write_summary(out_path, &summaries)?;
    info!("💾 Saved {} macrozone rows to {}", summaries.len(), out_path.display());
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: u64, macrozone: &str, price: Option<f64>, surface: Option<i64>) -> ListingRecord {
        let price_per_sqm = match (price, surface) {
            (Some(p), Some(s)) if s != 0 => Some(p / s as f64),
            _ => None,
        };
        ListingRecord {
            id: Some(id),
            city: Some("Milano".to_string()),
            macrozone: Some(macrozone.to_string()),
            neighbourhood: None,
            price,
            price_per_sqm,
            surface,
            rooms: Some(2),
            floor: None,
            property_type: None,
        }
    }

    #[test]
    fn test_describe_three_prices() {
        let stats = describe(&[300.0, 100.0, 200.0]).unwrap();
        assert_eq!(stats.mean, 200.0);
        assert_eq!(stats.median, 200.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.std, Some(100.0));
        assert_eq!(stats.q50, 200.0);
        assert_eq!(stats.q90, 280.0);
    }

    #[test]
    fn test_describe_single_value_has_no_std() {
        let stats = describe(&[42.0]).unwrap();
        assert_eq!(stats.std, None);
        assert_eq!(stats.q90, 42.0);
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn test_describe_rounds_to_two_decimals() {
        let stats = describe(&[1.0, 2.0, 2.0]).unwrap();
        assert_eq!(stats.mean, 1.67);
        assert_eq!(stats.std, Some(0.58));
    }

    #[test]
    fn test_summarize_city_groups_by_macrozone() {
        let rows = vec![
            record(1, "Centro", Some(100.0), Some(10)),
            record(2, "Centro", Some(200.0), Some(10)),
            record(3, "Centro", Some(300.0), Some(10)),
            record(4, "Navigli", Some(500.0), Some(50)),
            record(5, "Navigli", None, Some(50)),
            record(6, "Navigli", Some(900.0), None),
        ];

        let summaries = summarize_city(rows, None);
        assert_eq!(summaries.len(), 2);

        let centro = &summaries[0];
        assert_eq!(centro.city_name, "Milano");
        assert_eq!(centro.macrozone_name, "Centro");
        assert_eq!(centro.price.mean, 200.0);
        assert_eq!(centro.price.median, 200.0);
        assert_eq!(centro.price.min, 100.0);
        assert_eq!(centro.price.max, 300.0);
        assert_eq!(centro.price_per_sqm.unwrap().mean, 20.0);
        assert_eq!(centro.surface.mean, 10.0);

        let navigli = &summaries[1];
        assert_eq!(navigli.price.max, 500.0);
        assert_eq!(navigli.price.std, None);
    }

    #[test]
    fn test_round2_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(2.5), 2.5);
    }

    #[test]
    fn test_zero_priced_group_keeps_row_without_per_sqm() {
        let mut rows = vec![
            record(1, "Centro", Some(0.0), Some(50)),
            record(2, "Centro", Some(0.0), Some(60)),
        ];
        for row in &mut rows {
            row.price_per_sqm = None;
        }

        let summaries = summarize_city(rows, None);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].price.max, 0.0);
        assert_eq!(summaries[0].surface.mean, 55.0);
        assert!(summaries[0].price_per_sqm.is_none());
    }

    #[test]
    fn test_rows_without_macrozone_are_skipped() {
        let mut orphan = record(1, "Centro", Some(100.0), Some(10));
        orphan.macrozone = None;
        assert!(summarize_city(vec![orphan], None).is_empty());
    }

    #[test]
    fn test_outlier_trim_drops_top_price_per_sqm() {
        let rows = vec![
            record(1, "Centro", Some(100.0), Some(10)),
            record(2, "Centro", Some(200.0), Some(10)),
            record(3, "Centro", Some(10_000.0), Some(10)),
        ];
        let summaries = summarize_city(rows, Some(0.99));
        assert_eq!(summaries[0].price.max, 200.0);
    }

    #[test]
    fn test_summary_table_written_once_for_all_cities() {
        let dir = tempdir().unwrap();
        let csv_dir = dir.path().join("csv");
        let out_path = dir.path().join("out").join("summary_table.csv");

        crate::storage::write_listings(
            &csv_dir.join("lom_MI_8042.csv"),
            &[
                record(1, "Centro", Some(100.0), Some(10)),
                record(2, "Centro", Some(200.0), Some(10)),
                record(3, "Centro", Some(300.0), Some(10)),
            ],
        )
        .unwrap();
        let mut bergamo = record(9, "Città Alta", Some(150.0), Some(15));
        bergamo.city = Some("Bergamo".to_string());
        crate::storage::write_listings(&csv_dir.join("lom_BG_1234.csv"), &[bergamo]).unwrap();

        let summaries = compile_summary_table(&csv_dir, &out_path, None).unwrap();
        assert_eq!(summaries.len(), 2);

        let mut reader = csv::Reader::from_path(&out_path).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(header.get(0), Some("city_name"));
        assert_eq!(header.len(), 23);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(0), Some("Bergamo"));
        assert_eq!(rows[1].get(0), Some("Milano"));
        assert_eq!(rows[1].get(2), Some("200"));
    }

    #[test]
    fn test_corrupt_city_table_does_not_block_others() {
        let dir = tempdir().unwrap();
        let csv_dir = dir.path().join("csv");
        let out_path = dir.path().join("out").join("summary_table.csv");

        crate::storage::write_listings(
            &csv_dir.join("lom_MI_8042.csv"),
            &[record(1, "Centro", Some(100.0), Some(10))],
        )
        .unwrap();
        std::fs::write(
            csv_dir.join("lom_BG_1234.csv"),
            "id,city,macrozone,neighbourhood,price,price_per_sqm,surface,rooms,floor,type\n\
             abc,Bergamo,Città Alta,,150.0,10.0,15,,,\n",
        )
        .unwrap();

        let summaries = compile_summary_table(&csv_dir, &out_path, None).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].city_name, "Milano");
        assert!(out_path.exists());
    }
}
