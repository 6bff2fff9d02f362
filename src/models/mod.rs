use serde::{Deserialize, Serialize};

/// Geographic scope of a search query.
///
/// `macrozone_id` and `neighbourhood_id` are 0 when the key covers a whole city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LocationKey {
    pub region_id: String,
    pub province_id: String,
    pub city_id: u64,
    pub macrozone_id: u64,
    pub neighbourhood_id: u64,
}

impl LocationKey {
    /// True when the key targets the whole city rather than a macrozone
    pub fn is_whole_city(&self) -> bool {
        self.macrozone_id == 0
    }

    /// `region_province_city`, shared by every page of every zone in the city
    pub fn city_prefix(&self) -> String {
        format!("{}_{}_{}", self.region_id, self.province_id, self.city_id)
    }
}

/// One row of the index table: a location key plus human-readable names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexRow {
    pub region_name: String,
    pub region_id: String,
    pub province_name: String,
    pub province_id: String,
    pub city_name: String,
    pub city_id: u64,
    #[serde(default)]
    pub macrozone_name: String,
    #[serde(default)]
    pub macrozone_keyurl: String,
    pub macrozone_id: u64,
    #[serde(default)]
    pub neighbourhood_name: String,
    pub neighbourhood_id: u64,
}

impl IndexRow {
    pub fn key(&self) -> LocationKey {
        LocationKey {
            region_id: self.region_id.clone(),
            province_id: self.province_id.clone(),
            city_id: self.city_id,
            macrozone_id: self.macrozone_id,
            neighbourhood_id: self.neighbourhood_id,
        }
    }
}

/// A single page request for a location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub key: LocationKey,
    pub page: u32,
}

impl WorkItem {
    pub fn new(key: LocationKey, page: u32) -> Self {
        Self { key, page }
    }

    /// File name the raw response for this item is stored under
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.json",
            self.key.city_prefix(),
            self.key.macrozone_id,
            self.key.neighbourhood_id,
            self.page
        )
    }

    /// Recover a work item from a stored file stem (file name without `.json`)
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 6 || parts[0].is_empty() || parts[1].is_empty() {
            return None;
        }

        Some(Self {
            key: LocationKey {
                region_id: parts[0].to_string(),
                province_id: parts[1].to_string(),
                city_id: parts[2].parse().ok()?,
                macrozone_id: parts[3].parse().ok()?,
                neighbourhood_id: parts[4].parse().ok()?,
            },
            page: parts[5].parse().ok()?,
        })
    }
}

/// A probe that could not be turned into a page count
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeFailure {
    pub city_name: String,
    pub macrozone_name: String,
    pub reason: String,
}

/// Flattened listing row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub id: Option<u64>,
    pub city: Option<String>,
    pub macrozone: Option<String>,
    pub neighbourhood: Option<String>,
    pub price: Option<f64>,
    pub price_per_sqm: Option<f64>,
    pub surface: Option<i64>,
    pub rooms: Option<i64>,
    pub floor: Option<String>,
    #[serde(rename = "type")]
    pub property_type: Option<String>,
}

impl ListingRecord {
    /// Price and surface are both needed for any statistic
    pub fn has_required_metrics(&self) -> bool {
        self.price.is_some() && self.surface.is_some()
    }
}

/// Descriptive statistics for one metric within a macrozone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; undefined for fewer than two values
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q50: f64,
    pub q90: f64,
}

/// Summary row for a (city, macrozone) pair
#[derive(Debug, Clone, PartialEq)]
pub struct MacrozoneSummary {
    pub city_name: String,
    pub macrozone_name: String,
    pub price: MetricStats,
    /// Empty when no listing in the group has a non-zero price and surface
    pub price_per_sqm: Option<MetricStats>,
    pub surface: MetricStats,
}

const METRICS: [&str; 3] = ["price", "price_per_sqm", "surface"];
const STATS: [&str; 7] = ["mean", "median", "std", "min", "max", "q50", "q90"];

impl MacrozoneSummary {
    pub fn header() -> Vec<String> {
        let mut header = vec!["city_name".to_string(), "macrozone_name".to_string()];
        for metric in METRICS {
            for stat in STATS {
                header.push(format!("{}_{}", metric, stat));
            }
        }
        header
    }

    pub fn to_record(&self) -> Vec<String> {
        let mut record = vec![self.city_name.clone(), self.macrozone_name.clone()];
        for stats in [Some(&self.price), self.price_per_sqm.as_ref(), Some(&self.surface)] {
            match stats {
                Some(stats) => {
                    record.push(stats.mean.to_string());
                    record.push(stats.median.to_string());
                    record.push(stats.std.map(|s| s.to_string()).unwrap_or_default());
                    record.push(stats.min.to_string());
                    record.push(stats.max.to_string());
                    record.push(stats.q50.to_string());
                    record.push(stats.q90.to_string());
                }
                None => record.extend(std::iter::repeat(String::new()).take(STATS.len())),
            }
        }
        record
    }
}
