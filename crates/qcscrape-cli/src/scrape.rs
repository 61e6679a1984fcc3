//! Browser-driven commands. Only compiled with the `chrome` feature.

use std::path::Path;

use anyhow::Context;
use qcscrape_core::{load_categories, load_locations, AppConfig, CanonicalProduct, GeoPoint};
use qcscrape_scraper::{
    ChromeDriver, ChromeOptions, CsvProductWriter, NominatimGeocoder, ProductSink, ScrapeTarget,
    ScraperError, SweepConfig, SweepController, SweepReport,
};

use crate::process::{products_path, run_analyze, salvage_category};

/// Product sink for capture-only runs: raw payloads are still persisted by
/// the controller, products are dropped.
struct RawOnly;

impl ProductSink for RawOnly {
    fn append(&mut self, _products: &[CanonicalProduct]) -> Result<usize, ScraperError> {
        Ok(0)
    }
}

async fn launch(config: &AppConfig) -> anyhow::Result<ChromeDriver> {
    ChromeDriver::launch(&ChromeOptions::from_app_config(config))
        .await
        .context("failed to launch browser")
}

fn geocoder(config: &AppConfig) -> anyhow::Result<NominatimGeocoder> {
    NominatimGeocoder::new(
        &config.geocoder_url,
        &config.user_agent,
        config.request_timeout_secs,
    )
    .context("failed to build reverse geocoder")
}

/// Captures a single category listing URL, optionally at `location`.
///
/// # Errors
///
/// Returns an error if the browser cannot be started or the category
/// produced no output.
pub(crate) async fn run_scrape(
    config: &AppConfig,
    url: &str,
    location: Option<GeoPoint>,
    scrape_only: bool,
) -> anyhow::Result<()> {
    let target = ScrapeTarget::from_url(url);
    let driver = launch(config).await?;
    let geocoder = geocoder(config)?;
    let sweep_config = SweepConfig::from_app_config(config);

    let report = if scrape_only {
        let mut controller = SweepController::new(driver, geocoder, RawOnly, sweep_config);
        let report = run_single(&mut controller, location, &target).await;
        controller.into_parts().0.close().await;
        report?
    } else {
        let writer = CsvProductWriter::new(products_path(config));
        let mut controller = SweepController::new(driver, geocoder, writer, sweep_config);
        let report = run_single(&mut controller, location, &target).await;
        controller.into_parts().0.close().await;
        report?
    };

    if let Some(failure) = report.failures.first() {
        if !scrape_only {
            salvage_category(config, &target.pattern);
        }
        anyhow::bail!("category {} failed: {}", failure.category, failure.error);
    }
    let raw_dir = config.output_dir.join(&target.pattern);
    if scrape_only {
        println!("raw captures saved under {}", raw_dir.display());
    } else {
        println!(
            "wrote {} products to {} (raw captures under {})",
            report.products_written(),
            products_path(config).display(),
            raw_dir.display()
        );
    }
    Ok(())
}

async fn run_single<P: ProductSink>(
    controller: &mut SweepController<ChromeDriver, NominatimGeocoder, P>,
    location: Option<GeoPoint>,
    target: &ScrapeTarget,
) -> anyhow::Result<SweepReport> {
    controller.start().await?;
    let mut report = SweepReport::default();
    controller
        .run_location(location, std::slice::from_ref(target), &mut report)
        .await;
    Ok(report)
}

/// Runs every category at every location, then writes the reports.
///
/// # Errors
///
/// Returns an error if an input file is invalid, the browser cannot be
/// started, or the reports cannot be written. Failed categories are listed
/// but do not fail the command.
pub(crate) async fn run_sweep(
    config: &AppConfig,
    locations: &Path,
    categories: &Path,
) -> anyhow::Result<()> {
    let locations = load_locations(locations)
        .with_context(|| format!("failed to load locations from {}", locations.display()))?;
    let categories = load_categories(categories)
        .with_context(|| format!("failed to load categories from {}", categories.display()))?;
    tracing::info!(
        locations = locations.len(),
        categories = categories.len(),
        dedup_scope = %config.dedup_scope,
        "starting sweep"
    );

    let driver = launch(config).await?;
    let mut controller = SweepController::new(
        driver,
        geocoder(config)?,
        CsvProductWriter::new(products_path(config)),
        SweepConfig::from_app_config(config),
    );
    let report = controller.sweep(&locations, &categories).await;
    controller.into_parts().0.close().await;
    let report = report?;

    println!(
        "sweep finished: {} categories captured, {} failed, {} products written",
        report.completed.len(),
        report.failures.len(),
        report.products_written()
    );
    for failure in &report.failures {
        let at = failure
            .location
            .map_or_else(|| "default location".to_string(), |p| p.to_string());
        println!("  failed: {} at {at}: {}", failure.url, failure.error);
    }
    for point in &report.locations_not_set {
        println!("  location not applied: {point}");
    }

    if report.products_written() > 0 || products_path(config).exists() {
        run_analyze(config, None)?;
    }
    Ok(())
}
