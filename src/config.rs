use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;

use crate::scrapers::types::SearchParams;

pub const DEFAULT_BASE_URL: &str = "https://www.immobiliare.it";
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 10;

/// Resolved configuration for one run, passed explicitly into every stage
#[derive(Debug, Clone)]
pub struct Settings {
    /// Scheme and host of the listings site
    pub base_url: String,
    /// Directory the `listings/<yymmdd>/` tree is created under
    pub data_root: PathBuf,
    /// `yymmdd` stamp naming the run directory
    pub run_date: String,
    pub index_table: PathBuf,
    pub search: SearchParams,
    /// Concurrent page downloads
    pub download_workers: usize,
    /// Concurrent probes; `None` means one task per index row
    pub probe_workers: Option<usize>,
    /// Per-request timeout; `None` keeps the HTTP client's default
    pub request_timeout: Option<Duration>,
    /// Drop listings whose price per sqm is at or above this quantile of their city
    pub outlier_quantile: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_root: PathBuf::from("."),
            run_date: today_stamp(),
            index_table: PathBuf::from("table_builder/index_table.csv"),
            search: SearchParams::default(),
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            probe_workers: None,
            request_timeout: None,
            outlier_quantile: None,
        }
    }
}

/// Today's date in the `yymmdd` form used for run directories
pub fn today_stamp() -> String {
    Local::now().format("%y%m%d").to_string()
}
