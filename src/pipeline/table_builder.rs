//! Builds the index table of region/province/city/macrozone/neighbourhood ids
//! from a list of city names.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::IndexRow;
use crate::scrapers::ListingsApi;

/// Rows resolved from a city list plus the names that could not be resolved
#[derive(Debug, Default)]
pub struct TableBuild {
    pub rows: Vec<IndexRow>,
    pub missing: Vec<String>,
}

/// City names from a plain-text list, one per line
pub fn read_city_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read city list {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn text(value: &Value, field: &str) -> Option<String> {
    match value.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: &Value, field: &str) -> Option<u64> {
    match value.get(field)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// The autocomplete entry describing the city itself rather than a street or zone
pub fn find_admin_centre(answer: &Value) -> Option<&Value> {
    answer
        .as_array()?
        .iter()
        .find(|item| item.get("admin_centre").and_then(Value::as_bool) == Some(true))
}

/// Expand one city entry into index rows.
///
/// A city with macrozones yields one row per neighbourhood; a city without
/// yields a single whole-city row with zero ids.
pub fn parse_city_info(city: &Value) -> Result<Vec<IndexRow>> {
    let parents = city
        .get("parents")
        .and_then(Value::as_array)
        .context("City entry has no parents")?;
    let province = parents.first().context("City entry has no province")?;
    let region = parents.get(1).context("City entry has no region")?;

    let whole_city = IndexRow {
        region_name: text(region, "label").context("Region has no label")?,
        region_id: text(region, "id").context("Region has no id")?,
        province_name: text(province, "label").context("Province has no label")?,
        province_id: text(province, "id").context("Province has no id")?,
        city_name: text(city, "label").context("City has no label")?,
        city_id: number(city, "id").context("City has no numeric id")?,
        macrozone_name: String::new(),
        macrozone_keyurl: String::new(),
        macrozone_id: 0,
        neighbourhood_name: String::new(),
        neighbourhood_id: 0,
    };

    let macrozones = match city.get("macrozones").and_then(Value::as_array) {
        Some(zones) if !zones.is_empty() => zones,
        _ => return Ok(vec![whole_city]),
    };

    let mut rows = Vec::new();
    for macrozone in macrozones {
        let Some(macrozone_id) = number(macrozone, "id") else {
            warn!("{}: macrozone without id", whole_city.city_name);
            continue;
        };
        let children = macrozone
            .get("children")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for child in children {
            let Some(neighbourhood_id) = number(child, "id") else {
                continue;
            };
            rows.push(IndexRow {
                macrozone_name: text(macrozone, "label").unwrap_or_default(),
                macrozone_keyurl: text(macrozone, "keyurl").unwrap_or_default(),
                macrozone_id,
                neighbourhood_name: text(child, "label").unwrap_or_default(),
                neighbourhood_id,
                ..whole_city.clone()
            });
        }
    }
    Ok(rows)
}

/// Resolve every city name through the autocomplete endpoint.
///
/// Lookups run one at a time. A failed lookup or a name with no city match is
/// recorded as missing and the build carries on.
pub async fn build_index_table(api: &dyn ListingsApi, cities: &[String]) -> TableBuild {
    info!("Getting city info for {} cities", cities.len());

    let mut build = TableBuild::default();
    for city in cities {
        let resolved = match api.autocomplete(city).await {
            Ok(answer) => match find_admin_centre(&answer) {
                Some(info) => parse_city_info(info),
                None => Err(anyhow::anyhow!("no admin centre in answer")),
            },
            Err(e) => Err(e),
        };

        match resolved {
            Ok(rows) => build.rows.extend(rows),
            Err(e) => {
                warn!("{}: {:#}", city, e);
                build.missing.push(city.clone());
            }
        }
    }

    info!(
        "Saved data for {}/{} cities",
        cities.len() - build.missing.len(),
        cities.len()
    );
    if build.missing.is_empty() {
        info!("All cities found!");
    } else {
        info!(
            "Found {} missing cities: {}",
            build.missing.len(),
            build.missing.join(", ")
        );
    }
    build
}
