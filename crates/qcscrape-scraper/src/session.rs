//! Orchestration of capture runs across locations × categories.
//!
//! One browser session serves the whole sweep: between categories only the
//! page changes, and the location picker is driven only when the
//! coordinates actually change. A failing category is recorded in the
//! [`SweepReport`] and the sweep moves on.

use std::path::PathBuf;
use std::time::Duration;

use qcscrape_core::{
    category_pattern, category_pattern_from_url, category_url, parse_category_pattern, AppConfig,
    CategoryContext, DedupScope, GeoPoint,
};

use crate::capture::{capture_category, CaptureConfig, StopReason};
use crate::dedup::DedupStore;
use crate::driver::BrowserDriver;
use crate::error::ScraperError;
use crate::export::ProductSink;
use crate::geocode::ReverseGeocoder;
use crate::location::{set_location, LocationConfig};
use crate::normalize::{normalize_batch, today, NormalizeContext};
use crate::raw_store::RawCaptureStore;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    SessionStarted,
    CategoryNavigating,
    CategoryScraping,
    CategoryDone,
    LocationAdvancing,
    Finished,
}

/// One listing page to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeTarget {
    pub context: CategoryContext,
    pub url: String,
    /// Category pattern token, used as the raw-capture directory name.
    pub pattern: String,
}

impl ScrapeTarget {
    #[must_use]
    pub fn from_category(host: &str, context: &CategoryContext) -> Self {
        Self {
            context: context.clone(),
            url: category_url(host, context),
            pattern: category_pattern(context),
        }
    }

    /// Builds a target from a bare listing URL. Category names are the URL
    /// slugs when the URL follows the `/cn/.../cid/...` layout, else empty.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let pattern = category_pattern_from_url(url);
        Self {
            context: parse_category_pattern(&pattern).unwrap_or_default(),
            url: url.to_string(),
            pattern,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub storefront_host: String,
    pub output_dir: PathBuf,
    pub dedup_scope: DedupScope,
    pub inter_location_delay: Duration,
    pub capture: CaptureConfig,
    pub location: LocationConfig,
}

impl SweepConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            storefront_host: config.storefront_host.clone(),
            output_dir: config.output_dir.clone(),
            dedup_scope: config.dedup_scope,
            inter_location_delay: Duration::from_millis(config.inter_location_delay_ms),
            capture: CaptureConfig::from_app_config(config),
            location: LocationConfig::new(RetryPolicy::from_config(config)),
        }
    }
}

/// A category that produced no output, with enough context to re-run it.
#[derive(Debug, Clone)]
pub struct CategoryFailure {
    pub location: Option<GeoPoint>,
    pub category: String,
    pub url: String,
    pub error: String,
}

/// A category that was captured and written.
#[derive(Debug, Clone)]
pub struct CategoryResult {
    pub category: String,
    pub pages: usize,
    pub products_written: usize,
    pub duplicates: usize,
    pub unknown_payloads: usize,
    pub stop_reason: StopReason,
    pub retried: bool,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub completed: Vec<CategoryResult>,
    pub failures: Vec<CategoryFailure>,
    /// Locations whose picker procedure failed; their categories were
    /// scraped with whatever location the storefront had.
    pub locations_not_set: Vec<GeoPoint>,
}

impl SweepReport {
    #[must_use]
    pub fn products_written(&self) -> usize {
        self.completed.iter().map(|c| c.products_written).sum()
    }
}

pub struct SweepController<D, G, P> {
    driver: D,
    geocoder: G,
    products: P,
    config: SweepConfig,
    state: SweepState,
    current_location: Option<GeoPoint>,
    address: Option<String>,
    sweep_dedup: DedupStore,
    date: String,
}

impl<D, G, P> SweepController<D, G, P>
where
    D: BrowserDriver,
    G: ReverseGeocoder,
    P: ProductSink,
{
    pub fn new(driver: D, geocoder: G, products: P, config: SweepConfig) -> Self {
        Self {
            driver,
            geocoder,
            products,
            config,
            state: SweepState::Idle,
            current_location: None,
            address: None,
            sweep_dedup: DedupStore::new(),
            date: today(),
        }
    }

    /// Overrides the scrape date stamped on every product.
    #[must_use]
    pub fn with_date(mut self, date: &str) -> Self {
        self.date = date.to_string();
        self
    }

    #[must_use]
    pub fn state(&self) -> SweepState {
        self.state
    }

    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[must_use]
    pub fn products(&self) -> &P {
        &self.products
    }

    pub fn into_parts(self) -> (D, G, P) {
        (self.driver, self.geocoder, self.products)
    }

    /// Opens the storefront home page.
    ///
    /// # Errors
    ///
    /// Returns a driver error if the page cannot be loaded at all.
    pub async fn start(&mut self) -> Result<(), ScraperError> {
        let url = format!("https://{}/", self.config.storefront_host.trim_end_matches('/'));
        tracing::info!(url = %url, "starting browser session");
        self.driver.navigate(&url).await?;
        self.state = SweepState::SessionStarted;
        Ok(())
    }

    /// Runs every category at every location. With no locations, the
    /// categories are scraped once at the storefront's default location.
    ///
    /// # Errors
    ///
    /// Only session start-up failures are returned; per-category failures
    /// are collected in the report.
    pub async fn sweep(
        &mut self,
        locations: &[GeoPoint],
        categories: &[CategoryContext],
    ) -> Result<SweepReport, ScraperError> {
        let targets: Vec<ScrapeTarget> = categories
            .iter()
            .map(|c| ScrapeTarget::from_category(&self.config.storefront_host, c))
            .collect();

        let mut report = SweepReport::default();
        if self.state == SweepState::Idle {
            self.start().await?;
        }

        if locations.is_empty() {
            self.run_location(None, &targets, &mut report).await;
        } else {
            for (i, &location) in locations.iter().enumerate() {
                if i > 0 {
                    self.state = SweepState::LocationAdvancing;
                    tracing::info!(
                        delay_ms = u64::try_from(self.config.inter_location_delay.as_millis())
                            .unwrap_or(u64::MAX),
                        "pausing before next location"
                    );
                    tokio::time::sleep(self.config.inter_location_delay).await;
                }
                self.run_location(Some(location), &targets, &mut report).await;
            }
        }

        self.state = SweepState::Finished;
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failures.len(),
            products = report.products_written(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Runs `targets` at one location, recording results in `report`.
    pub async fn run_location(
        &mut self,
        location: Option<GeoPoint>,
        targets: &[ScrapeTarget],
        report: &mut SweepReport,
    ) {
        self.apply_location(location, report).await;

        for target in targets {
            match self.scrape_target(target).await {
                Ok(result) => report.completed.push(result),
                Err(e) => {
                    tracing::error!(
                        category = %target.pattern,
                        url = %target.url,
                        lat = location.map(|p| p.lat),
                        lng = location.map(|p| p.lng),
                        error = %e,
                        "category failed, continuing with next"
                    );
                    report.failures.push(CategoryFailure {
                        location,
                        category: target.pattern.clone(),
                        url: target.url.clone(),
                        error: e.to_string(),
                    });
                }
            }
            self.state = SweepState::CategoryDone;
        }
    }

    /// Drives the location picker unless the coordinates are unchanged.
    async fn apply_location(&mut self, location: Option<GeoPoint>, report: &mut SweepReport) {
        if location == self.current_location {
            tracing::debug!("location unchanged, skipping location picker");
            return;
        }
        self.current_location = location;

        let Some(point) = location else {
            self.address = None;
            return;
        };

        let address = self.geocoder.resolve(point.lat, point.lng).await;
        let result = set_location(&mut self.driver, point, &address, &self.config.location).await;
        self.address = Some(address);

        if let Err(e) = result {
            tracing::warn!(
                lat = point.lat,
                lng = point.lng,
                error = %e,
                "continuing with the storefront's current location"
            );
            report.locations_not_set.push(point);
        }
    }

    /// Navigates to one listing page, captures it, and writes its new products.
    ///
    /// # Errors
    ///
    /// Returns the navigation, capture or write failure for this category.
    pub async fn scrape_target(
        &mut self,
        target: &ScrapeTarget,
    ) -> Result<CategoryResult, ScraperError> {
        self.state = SweepState::CategoryNavigating;
        tracing::info!(category = %target.pattern, url = %target.url, "navigating to category");

        // Responses still in the log belong to the previous page.
        if let Err(e) = self.driver.capture_network_log().await {
            tracing::debug!(error = %e, "could not drain network log before navigation");
        }
        self.driver.navigate(&target.url).await?;

        self.state = SweepState::CategoryScraping;
        let mut raw_store = RawCaptureStore::new(
            &self.config.output_dir,
            &target.pattern,
            &target.url,
            self.current_location,
            self.address.clone(),
        );
        let outcome = capture_category(
            &mut self.driver,
            &mut raw_store,
            &self.config.capture,
            &target.pattern,
            &target.url,
        )
        .await?;

        let ctx = NormalizeContext {
            category: &target.context,
            location: self.current_location,
            date: &self.date,
        };
        let mut run_dedup = DedupStore::new();
        let dedup = match self.config.dedup_scope {
            DedupScope::Run => &mut run_dedup,
            DedupScope::Sweep => &mut self.sweep_dedup,
        };
        let batch = normalize_batch(outcome.payloads.iter(), &ctx, dedup);
        let known_products = dedup.len();
        let products_written = self.products.append(&batch.products)?;

        tracing::info!(
            category = %target.pattern,
            pages = outcome.payloads.len(),
            products = products_written,
            duplicates = batch.duplicates,
            unknown_payloads = batch.unknown_payloads,
            known_products,
            malformed = outcome.malformed,
            non_listing = outcome.non_listing,
            stop_reason = %outcome.stop_reason,
            "category complete"
        );

        Ok(CategoryResult {
            category: target.pattern.clone(),
            pages: outcome.payloads.len(),
            products_written,
            duplicates: batch.duplicates,
            unknown_payloads: batch.unknown_payloads,
            stop_reason: outcome.stop_reason,
            retried: outcome.retried,
        })
    }
}
