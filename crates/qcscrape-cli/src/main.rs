mod process;
#[cfg(feature = "chrome")]
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qcscrape")]
#[command(about = "Quick-commerce listing capture and analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Capture one category listing page, then normalize it
    Scrape {
        /// Category listing URL
        #[arg(long)]
        url: String,
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Scroll ceiling, overriding QCSCRAPE_MAX_SCROLLS
        #[arg(long)]
        scroll: Option<u32>,
        /// Only capture raw payloads; skip writing products
        #[arg(long, conflicts_with = "process_only")]
        scrape_only: bool,
        /// Only normalize raw payloads already on disk for this URL
        #[arg(long)]
        process_only: bool,
    },
    /// Capture every category at every location
    Sweep {
        /// CSV with `latitude,longitude` columns
        #[arg(long)]
        locations: PathBuf,
        /// CSV with `l1_category,l1_category_id,l2_category,l2_category_id` columns
        #[arg(long)]
        categories: PathBuf,
        #[arg(long)]
        scroll: Option<u32>,
    },
    /// Normalize raw captures on disk into the product CSV
    Process {
        /// Category pattern directory to process; all when omitted
        #[arg(long)]
        category: Option<String>,
        /// Categories CSV used to recover display names for patterns
        #[arg(long)]
        categories: Option<PathBuf>,
    },
    /// Write the summary, price variation and offer pattern reports
    Analyze {
        /// Product CSV; defaults to `<output_dir>/products.csv`
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = qcscrape_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Scrape {
            url,
            lat,
            lng,
            scroll,
            scrape_only,
            process_only,
        } => {
            let location = match (lat, lng) {
                (Some(lat), Some(lng)) => Some(validate_point(lat, lng)?),
                _ => None,
            };
            if let Some(n) = scroll {
                config.max_scrolls = n;
            }
            if process_only {
                let target = qcscrape_scraper::ScrapeTarget::from_url(&url);
                return process::run_process(&config, Some(&target.pattern), None);
            }
            run_scrape(&config, &url, location, scrape_only).await
        }
        Commands::Sweep {
            locations,
            categories,
            scroll,
        } => {
            if let Some(n) = scroll {
                config.max_scrolls = n;
            }
            run_sweep(&config, &locations, &categories).await
        }
        Commands::Process {
            category,
            categories,
        } => process::run_process(&config, category.as_deref(), categories.as_deref()),
        Commands::Analyze { input } => process::run_analyze(&config, input.as_deref()),
    }
}

fn validate_point(lat: f64, lng: f64) -> anyhow::Result<qcscrape_core::GeoPoint> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        anyhow::bail!("coordinates out of range: lat={lat}, lng={lng}");
    }
    Ok(qcscrape_core::GeoPoint::new(lat, lng))
}

#[cfg(feature = "chrome")]
async fn run_scrape(
    config: &qcscrape_core::AppConfig,
    url: &str,
    location: Option<qcscrape_core::GeoPoint>,
    scrape_only: bool,
) -> anyhow::Result<()> {
    scrape::run_scrape(config, url, location, scrape_only).await
}

#[cfg(feature = "chrome")]
async fn run_sweep(
    config: &qcscrape_core::AppConfig,
    locations: &std::path::Path,
    categories: &std::path::Path,
) -> anyhow::Result<()> {
    scrape::run_sweep(config, locations, categories).await
}

#[cfg(not(feature = "chrome"))]
#[allow(clippy::unused_async)]
async fn run_scrape(
    _config: &qcscrape_core::AppConfig,
    _url: &str,
    _location: Option<qcscrape_core::GeoPoint>,
    _scrape_only: bool,
) -> anyhow::Result<()> {
    anyhow::bail!("`scrape` drives a browser; rebuild with `--features chrome`")
}

#[cfg(not(feature = "chrome"))]
#[allow(clippy::unused_async)]
async fn run_sweep(
    _config: &qcscrape_core::AppConfig,
    _locations: &std::path::Path,
    _categories: &std::path::Path,
) -> anyhow::Result<()> {
    anyhow::bail!("`sweep` drives a browser; rebuild with `--features chrome`")
}
