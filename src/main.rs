mod config;
mod models;
mod pipeline;
mod scrapers;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use config::Settings;
use pipeline::{aggregate, download, flatten, index, table_builder};
use scrapers::types::{Contract, SearchParams};
use scrapers::{ImmobiliareClient, ListingsApi};
use storage::{read_index_table, write_index_table, RunLayout};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Scrape real-estate listings and summarize prices per macrozone")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CommonArgs {
    /// Scheme and host of the listings site
    #[arg(long, env = "LISTING_SCOUT_BASE_URL", default_value = config::DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Directory holding the listings/<yymmdd>/ tree
    #[arg(long, env = "LISTING_SCOUT_DATA_ROOT", default_value = ".", global = true)]
    data_root: PathBuf,

    /// Run directory stamp (yymmdd); defaults to today
    #[arg(long, global = true)]
    date: Option<String>,

    /// Index table CSV
    #[arg(long, default_value = "table_builder/index_table.csv", global = true)]
    index_table: PathBuf,

    #[arg(long, value_enum, default_value = "sale", global = true)]
    contract: Contract,

    /// Property category code
    #[arg(long, default_value_t = 1, global = true)]
    category: u32,

    /// Concurrent page downloads
    #[arg(long, default_value_t = config::DEFAULT_DOWNLOAD_WORKERS, global = true)]
    workers: usize,

    /// Cap on concurrent probes (default: no cap)
    #[arg(long, global = true)]
    probe_workers: Option<usize>,

    /// Per-request timeout in seconds (default: HTTP client default)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Drop listings at or above this price-per-sqm quantile of their city before summarizing
    #[arg(long, global = true)]
    outlier_quantile: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a city list into the index table
    BuildTable {
        /// Plain-text file with one city name per line
        #[arg(long, default_value = "table_builder/italy_citylist.txt")]
        cities: PathBuf,
    },
    /// Probe every index row and print how many pages would be downloaded
    Index,
    /// Probe every index row and download all listing pages
    Download,
    /// Flatten downloaded pages into per-city tables
    Flatten,
    /// Summarize per-city tables by macrozone
    Summarize,
    /// Download, flatten and summarize
    Run,
}

impl CommonArgs {
    fn settings(&self) -> Settings {
        Settings {
            base_url: self.base_url.clone(),
            data_root: self.data_root.clone(),
            run_date: self.date.clone().unwrap_or_else(config::today_stamp),
            index_table: self.index_table.clone(),
            search: SearchParams {
                contract: self.contract,
                category: self.category,
            },
            download_workers: self.workers,
            probe_workers: self.probe_workers,
            request_timeout: self.timeout_secs.map(Duration::from_secs),
            outlier_quantile: self.outlier_quantile,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.common.settings();
    let layout = RunLayout::new(&settings.data_root, &settings.run_date);

    info!("🏠 Listing Scout - run {}", settings.run_date);

    match cli.command {
        Command::BuildTable { cities } => {
            let client = ImmobiliareClient::new(&settings)?;
            let names = table_builder::read_city_list(&cities)?;
            let build = table_builder::build_index_table(&client, &names).await;
            write_index_table(&settings.index_table, &build.rows)?;
            info!(
                "💾 Saved {} index rows to {}",
                build.rows.len(),
                settings.index_table.display()
            );
        }
        Command::Index => {
            let api: Arc<dyn ListingsApi> = Arc::new(ImmobiliareClient::new(&settings)?);
            let rows = read_index_table(&settings.index_table)?;
            let outcome = index::build_work_items(api, rows, settings.probe_workers).await;
            println!(
                "{} pages to download, {} failed probes",
                outcome.items.len(),
                outcome.failures.len()
            );
        }
        Command::Download => {
            let api: Arc<dyn ListingsApi> = Arc::new(ImmobiliareClient::new(&settings)?);
            let rows = read_index_table(&settings.index_table)?;
            let outcome = index::build_work_items(Arc::clone(&api), rows, settings.probe_workers).await;
            download::download_listings(api, outcome.items, &layout.json_dir, settings.download_workers)
                .await?;
        }
        Command::Flatten => {
            flatten::compile_city_tables(&layout.json_dir, &layout.csv_dir)?;
        }
        Command::Summarize => {
            aggregate::compile_summary_table(
                &layout.csv_dir,
                &layout.summary_path(),
                settings.outlier_quantile,
            )?;
        }
        Command::Run => {
            let api: Arc<dyn ListingsApi> = Arc::new(ImmobiliareClient::new(&settings)?);
            let summaries = pipeline::run_pipeline(&settings, api).await?;

            for (i, row) in summaries.iter().enumerate() {
                let per_sqm = row
                    .price_per_sqm
                    .map(|stats| stats.median.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}. {} / {}: median {} €, {} €/m², {} m²",
                    i + 1,
                    row.city_name,
                    row.macrozone_name,
                    row.price.median,
                    per_sqm,
                    row.surface.median
                );
            }
        }
    }

    Ok(())
}
