//! Setting the storefront's delivery location through its location picker.
//!
//! The storefront ships several generations of class names for the same
//! widgets, so each step tries a list of candidate selectors in order.

use std::time::{Duration, Instant};

use qcscrape_core::GeoPoint;
use serde_json::Value;

use crate::driver::BrowserDriver;
use crate::error::{DriverError, ScraperError};
use crate::geocode::search_query;
use crate::retry::RetryPolicy;

pub const LOCATION_BUTTON_SELECTORS: [&str; 3] = [
    ".LocationBar__Container-sc-x8ezho-6",
    ".LocationBar__Container",
    "[data-testid='location-button']",
];

pub const LOCATION_INPUT_SELECTORS: [&str; 4] = [
    "input[name='select-locality']",
    "input[placeholder*='search delivery location']",
    "input[placeholder*='location']",
    ".LocationSearchBox__InputSelect",
];

pub const LOCATION_RESULT_SELECTORS: [&str; 3] = [
    ".LocationSearchList__LocationDetailContainer-sc-93rfr7-1",
    ".LocationSearchList__LocationDetailContainer",
    "[data-testid='location-search-result']",
];

/// Query-string marker the storefront adds once a location is applied.
const CONFIRM_MARKER: &str = "latitude=";

#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub retry: RetryPolicy,
    /// Per-selector wait when looking for a widget.
    pub selector_timeout: Duration,
    /// Pause after opening the picker and after typing the query.
    pub ui_settle: Duration,
    /// How long to watch the URL for the confirmation marker.
    pub confirm_timeout: Duration,
    pub confirm_poll: Duration,
}

impl LocationConfig {
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            selector_timeout: Duration::from_secs(5),
            ui_settle: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(10),
            confirm_poll: Duration::from_secs(1),
        }
    }
}

/// Applies `point` as the delivery location, searching for `address`.
///
/// Returns `Ok` once a search result has been picked. The URL marker is
/// only used as confirmation: its absence is logged, not treated as failure.
///
/// # Errors
///
/// Returns [`ScraperError::LocationNotSet`] when every attempt allowed by
/// the retry policy failed.
pub async fn set_location<D>(
    driver: &mut D,
    point: GeoPoint,
    address: &str,
    config: &LocationConfig,
) -> Result<(), ScraperError>
where
    D: BrowserDriver + ?Sized,
{
    let query = search_query(address);
    tracing::info!(lat = point.lat, lng = point.lng, query, "setting delivery location");

    let mut attempt = 1;
    loop {
        let err = match try_set_location(driver, query, config).await {
            Ok(()) => break,
            Err(e) => e,
        };
        if !config.retry.backoff("location-set", attempt, &err).await {
            tracing::warn!(
                lat = point.lat,
                lng = point.lng,
                error = %err,
                "giving up on setting location"
            );
            return Err(ScraperError::LocationNotSet {
                lat: point.lat,
                lng: point.lng,
                attempts: attempt,
            });
        }
        attempt += 1;
    }

    if wait_for_confirmation(driver, config).await {
        tracing::info!(lat = point.lat, lng = point.lng, "location confirmed via URL");
    } else {
        tracing::warn!(
            lat = point.lat,
            lng = point.lng,
            "location picked but not confirmed via URL"
        );
    }
    Ok(())
}

async fn try_set_location<D>(
    driver: &mut D,
    query: &str,
    config: &LocationConfig,
) -> Result<(), DriverError>
where
    D: BrowserDriver + ?Sized,
{
    let button = first_present(driver, &LOCATION_BUTTON_SELECTORS, config.selector_timeout).await?;
    click(driver, button).await?;
    tokio::time::sleep(config.ui_settle).await;

    let input = first_present(driver, &LOCATION_INPUT_SELECTORS, config.selector_timeout).await?;
    type_into(driver, input, query).await?;
    tokio::time::sleep(config.ui_settle).await;

    let result = first_present(driver, &LOCATION_RESULT_SELECTORS, config.selector_timeout).await?;
    click(driver, result).await
}

/// Returns the first selector that matches an element.
async fn first_present<'s, D>(
    driver: &mut D,
    selectors: &[&'s str],
    timeout: Duration,
) -> Result<&'s str, DriverError>
where
    D: BrowserDriver + ?Sized,
{
    for &selector in selectors {
        match driver.find_element(selector, timeout).await {
            Ok(()) => return Ok(selector),
            Err(e) => tracing::debug!(selector, error = %e, "selector did not match"),
        }
    }
    Err(DriverError::ElementNotFound {
        selector: selectors.join(" | "),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    })
}

async fn click<D>(driver: &mut D, selector: &str) -> Result<(), DriverError>
where
    D: BrowserDriver + ?Sized,
{
    let script = format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.scrollIntoView({{behavior: 'smooth', block: 'center'}}); el.click(); return true; }})()",
        sel = js_string(selector)
    );
    expect_true(driver.execute_script(&script).await?, selector)
}

async fn type_into<D>(driver: &mut D, selector: &str, text: &str) -> Result<(), DriverError>
where
    D: BrowserDriver + ?Sized,
{
    let script = format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.focus(); \
         const setter = Object.getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set; \
         setter.call(el, {text}); el.dispatchEvent(new Event('input', {{bubbles: true}})); \
         return true; }})()",
        sel = js_string(selector),
        text = js_string(text)
    );
    expect_true(driver.execute_script(&script).await?, selector)
}

fn expect_true(result: Value, selector: &str) -> Result<(), DriverError> {
    if result == Value::Bool(true) {
        Ok(())
    } else {
        Err(DriverError::Script(format!(
            "element \"{selector}\" vanished before it could be used"
        )))
    }
}

async fn wait_for_confirmation<D>(driver: &mut D, config: &LocationConfig) -> bool
where
    D: BrowserDriver + ?Sized,
{
    let started = Instant::now();
    loop {
        match driver.current_url().await {
            Ok(url) if url.contains(CONFIRM_MARKER) => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "could not read current URL"),
        }
        if started.elapsed() >= config.confirm_timeout {
            return false;
        }
        tokio::time::sleep(config.confirm_poll).await;
    }
}

/// Encodes `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
