//! Raw listing pages to per-city tables.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::models::{ListingRecord, WorkItem};
use crate::storage::{ensure_directory, list_files, write_listings};

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(\.\d+)?").expect("numeric pattern is valid"))
}

/// First number embedded in a decorated string such as `"85 m²"` or `"5+"`
pub fn first_number(text: &str) -> Option<&str> {
    number_pattern().find(text).map(|m| m.as_str())
}

/// Surface in square metres; `.` is a thousands separator (`"1.234 m²"` is 1234)
pub fn parse_surface(text: &str) -> Option<i64> {
    first_number(text)?.replace('.', "").parse().ok()
}

/// Room count; the integer part of the first number (`"5+"` is 5)
pub fn parse_rooms(text: &str) -> Option<i64> {
    let number = first_number(text)?;
    number.split('.').next()?.parse().ok()
}

fn text_at(listing: &Value, pointer: &str) -> Option<String> {
    match listing.pointer(pointer)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decorated_number(
    listing: &Value,
    pointer: &str,
    field: &str,
    parse: fn(&str) -> Option<i64>,
) -> Option<i64> {
    let text = text_at(listing, pointer)?;
    let value = parse(&text);
    if value.is_none() {
        warn!("No number in {} '{}'", field, text);
    }
    value
}

/// Project one entry of a page's `results` array onto a flat record.
///
/// Missing keys at any depth yield `None` for that field.
pub fn parse_listing(listing: &Value) -> ListingRecord {
    const PROPS: &str = "/realEstate/properties/0";

    let id = listing.pointer("/realEstate/id").and_then(|id| match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });
    let price = listing
        .pointer("/realEstate/price/value")
        .and_then(Value::as_f64);
    let surface = decorated_number(listing, &format!("{PROPS}/surface"), "surface", parse_surface);
    let rooms = decorated_number(listing, &format!("{PROPS}/rooms"), "rooms", parse_rooms);

    let price_per_sqm = match (price, surface) {
        (Some(price), Some(surface)) if price != 0.0 && surface != 0 => Some(price / surface as f64),
        _ => None,
    };

    ListingRecord {
        id,
        city: text_at(listing, &format!("{PROPS}/location/city")),
        macrozone: text_at(listing, &format!("{PROPS}/location/macrozone")),
        neighbourhood: text_at(listing, &format!("{PROPS}/location/microzone")),
        price,
        price_per_sqm,
        surface,
        rooms,
        floor: text_at(listing, &format!("{PROPS}/floor/abbreviation")),
        property_type: text_at(listing, &format!("{PROPS}/typology/name")),
    }
}

/// Flatten a raw listings response body
pub fn flatten_page(body: &str) -> Result<Vec<ListingRecord>> {
    let page: Value = serde_json::from_str(body).context("Listings page is not JSON")?;
    let records = page
        .get("results")
        .and_then(Value::as_array)
        .map(|results| results.iter().map(parse_listing).collect())
        .unwrap_or_default();
    Ok(records)
}

pub fn flatten_file(path: &Path) -> Result<Vec<ListingRecord>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    flatten_page(&body).with_context(|| format!("Could not parse {}", path.display()))
}

/// Group stored pages by the city prefix of their file names
pub fn group_by_city(files: Vec<PathBuf>) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        let item = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(WorkItem::from_file_stem);
        match item {
            Some(item) => groups.entry(item.key.city_prefix()).or_default().push(path),
            None => debug!("Ignoring {}", path.display()),
        }
    }
    groups
}

/// Keep rows with both required metrics, dropping repeated listing ids
pub fn clean_city_rows(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(ListingRecord::has_required_metrics)
        .filter(|record| record.id.map_or(true, |id| seen.insert(id)))
        .collect()
}

/// Rows gathered for every city, before cleaning
pub fn flatten_cities(json_dir: &Path) -> Result<BTreeMap<String, Vec<ListingRecord>>> {
    let groups = group_by_city(list_files(json_dir, "json")?);

    let mut cities = BTreeMap::new();
    for (city, files) in groups {
        let mut records = Vec::new();
        for path in &files {
            match flatten_file(path) {
                Ok(rows) => records.extend(rows),
                Err(e) => warn!("{:#}", e),
            }
        }
        cities.insert(city, records);
    }
    Ok(cities)
}

/// Write one cleaned table per city into `csv_dir`, returning the paths written.
///
/// Tables left in `csv_dir` by an earlier pass are removed first, so a city with
/// no complete listings this time has no table at all.
pub fn compile_city_tables(json_dir: &Path, csv_dir: &Path) -> Result<Vec<PathBuf>> {
    ensure_directory(csv_dir)?;
    for stale in list_files(csv_dir, "csv")? {
        std::fs::remove_file(&stale)
            .with_context(|| format!("Failed to remove {}", stale.display()))?;
    }

    let cities = flatten_cities(json_dir)?;
    info!("Compiling city tables for {} cities", cities.len());

    let mut written = Vec::new();
    for (city, records) in cities {
        let total = records.len();
        let rows = clean_city_rows(records);
        if rows.is_empty() {
            warn!("{}: none of {} listings have price and surface", city, total);
            continue;
        }

        let path = csv_dir.join(format!("{}.csv", city));
        write_listings(&path, &rows)?;
        debug!("{}: kept {}/{} listings", city, rows.len(), total);
        written.push(path);
    }

    info!("💾 Wrote {} city tables to {}", written.len(), csv_dir.display());
    Ok(written)
}
