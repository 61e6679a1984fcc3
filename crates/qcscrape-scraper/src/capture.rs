//! The scroll-driven capture loop.
//!
//! Each scroll nudges the storefront into fetching another listing page.
//! After a randomized settle interval the driver's network log is polled,
//! every listing response is keyed by [`ResponseKey`], and unseen pages are
//! kept and persisted on the spot. The loop ends on the first of three typed
//! stop reasons, see [`TerminationPolicy`].

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use qcscrape_core::AppConfig;
use serde_json::Value;

use crate::driver::BrowserDriver;
use crate::error::ScraperError;
use crate::fingerprint::ResponseKey;
use crate::pagination::{PageSignal, PaginationTracker};
use crate::payload::RawPayload;
use crate::raw_store::CaptureSink;
use crate::retry::RetryPolicy;

/// Element that scrolls the product grid on listing pages.
pub const CONTAINER_SELECTOR: &str = "#plpContainer";

const PRODUCT_CARD_SELECTOR: &str = "div > div > div[style*='grid-column: span']";
const WANDER_PROBABILITY: f64 = 0.2;
const WANDER_PAUSE: Duration = Duration::from_secs(2);
const SCREENSHOT_EVERY: u32 = 3;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Substring identifying listing API responses in the network log.
    pub api_marker: String,
    pub max_scrolls: u32,
    pub stall_threshold: u32,
    pub scroll_stride_px: u32,
    pub scroll_stride_growth_px: u32,
    pub settle_min: Duration,
    pub settle_jitter: Duration,
    /// Wait after a refresh before the retry cycle starts scrolling.
    pub page_load_wait: Duration,
    pub container_timeout: Duration,
    /// Scroll ceiling of the single refresh-and-retry cycle.
    pub retry_scroll_ceiling: u32,
    pub retry: RetryPolicy,
    /// Occasionally scroll a random product card into view between scrolls.
    pub wander: bool,
    /// When set, a screenshot is saved here every few scrolls.
    pub screenshot_dir: Option<PathBuf>,
}

impl CaptureConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            api_marker: config.api_marker.clone(),
            max_scrolls: config.max_scrolls,
            stall_threshold: config.stall_threshold,
            scroll_stride_px: config.scroll_stride_px,
            scroll_stride_growth_px: config.scroll_stride_growth_px,
            settle_min: Duration::from_millis(config.settle_min_ms),
            settle_jitter: Duration::from_millis(config.settle_jitter_ms),
            page_load_wait: Duration::from_millis(config.page_load_wait_ms),
            container_timeout: Duration::from_secs(config.container_timeout_secs),
            retry_scroll_ceiling: config.retry_scroll_ceiling,
            retry: RetryPolicy::from_config(config),
            wander: true,
            screenshot_dir: config
                .debug_screenshots
                .then(|| config.output_dir.join("screenshots")),
        }
    }

    /// Distance of the `index`-th scroll (0-based): the stride grows each time.
    #[must_use]
    pub fn stride(&self, index: u32) -> u32 {
        self.scroll_stride_px
            .saturating_add(self.scroll_stride_growth_px.saturating_mul(index))
    }

    fn settle_delay(&self) -> Duration {
        self.settle_min + self.settle_jitter.mul_f64(rand::random::<f64>())
    }
}

/// Why a capture loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The pagination tracker saw the last page.
    PaginationExhausted,
    /// This many consecutive scrolls produced no new page.
    Stalled { consecutive: u32 },
    /// The absolute scroll ceiling was reached.
    ScrollCeiling { scrolls: u32 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaginationExhausted => write!(f, "pagination exhausted"),
            Self::Stalled { consecutive } => {
                write!(f, "stalled after {consecutive} scrolls without new pages")
            }
            Self::ScrollCeiling { scrolls } => write!(f, "scroll ceiling of {scrolls} reached"),
        }
    }
}

/// The three independent stop conditions, checked in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub stall_threshold: u32,
    pub max_scrolls: u32,
}

impl TerminationPolicy {
    #[must_use]
    pub fn pagination_stop(tracker: &PaginationTracker) -> Option<StopReason> {
        (!tracker.has_more()).then_some(StopReason::PaginationExhausted)
    }

    #[must_use]
    pub fn stall_stop(&self, consecutive_stalls: u32) -> Option<StopReason> {
        (consecutive_stalls >= self.stall_threshold.max(1)).then_some(StopReason::Stalled {
            consecutive: consecutive_stalls,
        })
    }

    #[must_use]
    pub fn ceiling_stop(&self, scrolls: u32) -> Option<StopReason> {
        (scrolls >= self.max_scrolls).then_some(StopReason::ScrollCeiling { scrolls })
    }

    /// First applicable stop reason for `session`, if any.
    #[must_use]
    pub fn evaluate(&self, session: &CaptureSession) -> Option<StopReason> {
        Self::pagination_stop(&session.tracker)
            .or_else(|| self.stall_stop(session.consecutive_stalls))
            .or_else(|| self.ceiling_stop(session.scrolls))
    }
}

/// Mutable state of one (location, category) capture.
#[derive(Debug, Default)]
pub struct CaptureSession {
    payloads: Vec<Value>,
    keys: HashSet<ResponseKey>,
    seen_requests: HashSet<String>,
    scrolls: u32,
    consecutive_stalls: u32,
    tracker: PaginationTracker,
    malformed: usize,
    failed_bodies: usize,
    non_listing: usize,
}

impl CaptureSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique payloads in capture order.
    #[must_use]
    pub fn payloads(&self) -> &[Value] {
        &self.payloads
    }

    #[must_use]
    pub fn into_payloads(self) -> Vec<Value> {
        self.payloads
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    #[must_use]
    pub fn scroll_count(&self) -> u32 {
        self.scrolls
    }

    #[must_use]
    pub fn consecutive_stalls(&self) -> u32 {
        self.consecutive_stalls
    }

    #[must_use]
    pub fn last_next_url(&self) -> Option<&str> {
        self.tracker.last_next_url()
    }

    #[must_use]
    pub fn known_total(&self) -> Option<u64> {
        self.tracker.known_total()
    }

    /// Response bodies that were not valid JSON.
    #[must_use]
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Response bodies the driver could not fetch.
    #[must_use]
    pub fn failed_bodies(&self) -> usize {
        self.failed_bodies
    }

    /// JSON bodies of neither listing shape, such as error replies.
    #[must_use]
    pub fn non_listing(&self) -> usize {
        self.non_listing
    }

    /// Keeps `payload` if its key is new, returning its capture index.
    pub fn insert(&mut self, payload: Value) -> Option<usize> {
        if !self.keys.insert(ResponseKey::of(&payload)) {
            return None;
        }
        self.payloads.push(payload);
        Some(self.payloads.len() - 1)
    }

    fn record_scroll(&mut self, new_pages: usize) {
        self.scrolls += 1;
        if new_pages == 0 {
            self.consecutive_stalls += 1;
        } else {
            self.consecutive_stalls = 0;
        }
    }
}

/// Result of capturing one category page.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub payloads: Vec<Value>,
    pub stop_reason: StopReason,
    pub scrolls: u32,
    /// Whether the refresh-and-retry cycle was needed.
    pub retried: bool,
    pub malformed: usize,
    pub failed_bodies: usize,
    pub non_listing: usize,
}

/// Drives one capture loop until a stop reason applies.
///
/// Driver failures inside the loop are logged and skipped; this never fails.
pub async fn run_capture<D, S>(
    session: &mut CaptureSession,
    driver: &mut D,
    sink: &mut S,
    config: &CaptureConfig,
    max_scrolls: u32,
) -> StopReason
where
    D: BrowserDriver + ?Sized,
    S: CaptureSink + ?Sized,
{
    let policy = TerminationPolicy {
        stall_threshold: config.stall_threshold,
        max_scrolls,
    };

    let (initial, signal) = poll_network(session, driver, sink, &config.api_marker).await;
    tracing::info!(pages = initial, ?signal, "initial listing pages captured");

    let use_container = find_container(driver, config).await;

    loop {
        if let Some(reason) = policy.evaluate(session) {
            tracing::info!(
                scrolls = session.scrolls,
                pages = session.payloads.len(),
                known_total = session.known_total(),
                last_next_url = session.last_next_url().unwrap_or_default(),
                reason = %reason,
                "capture loop finished"
            );
            return reason;
        }

        let index = session.scrolls;
        if let Some(dir) = &config.screenshot_dir {
            if index % SCREENSHOT_EVERY == 0 {
                let path = dir.join(format!("scroll_{index}.png"));
                if let Err(e) = driver.screenshot(&path).await {
                    tracing::warn!(error = %e, path = %path.display(), "debug screenshot failed");
                }
            }
        }

        scroll_once(driver, use_container, config.stride(index)).await;
        tokio::time::sleep(config.settle_delay()).await;

        let (new_pages, signal) = poll_network(session, driver, sink, &config.api_marker).await;
        session.record_scroll(new_pages);
        tracing::debug!(
            scroll = session.scrolls,
            new_pages,
            ?signal,
            consecutive_stalls = session.consecutive_stalls,
            "scroll complete"
        );

        if config.wander && rand::random::<f64>() < WANDER_PROBABILITY {
            wander(driver).await;
        }
    }
}

/// Captures one category page that the driver has already loaded.
///
/// When the first loop captures nothing, the page is reloaded once and a
/// shorter loop is run.
///
/// # Errors
///
/// Returns [`ScraperError::NoPayloadsCaptured`] if neither loop captured a
/// page, or a driver error if the reload itself fails.
pub async fn capture_category<D, S>(
    driver: &mut D,
    sink: &mut S,
    config: &CaptureConfig,
    category: &str,
    url: &str,
) -> Result<CaptureOutcome, ScraperError>
where
    D: BrowserDriver + ?Sized,
    S: CaptureSink + ?Sized,
{
    let mut session = CaptureSession::new();
    let mut stop_reason = run_capture(&mut session, driver, sink, config, config.max_scrolls).await;
    let mut retried = false;

    if session.is_empty() {
        tracing::warn!(category, url, "no listing pages captured, refreshing and retrying");
        retried = true;
        driver.reload().await?;
        tokio::time::sleep(config.page_load_wait).await;

        session = CaptureSession {
            malformed: session.malformed,
            failed_bodies: session.failed_bodies,
            non_listing: session.non_listing,
            ..CaptureSession::default()
        };
        stop_reason =
            run_capture(&mut session, driver, sink, config, config.retry_scroll_ceiling).await;

        if session.is_empty() {
            return Err(ScraperError::NoPayloadsCaptured {
                category: category.to_string(),
                url: url.to_string(),
            });
        }
    }

    Ok(CaptureOutcome {
        stop_reason,
        scrolls: session.scrolls,
        retried,
        malformed: session.malformed,
        failed_bodies: session.failed_bodies,
        non_listing: session.non_listing,
        payloads: session.into_payloads(),
    })
}

/// Drains the network log, keeping unseen listing pages. Returns how many
/// new pages were kept and what the batch told the pagination tracker.
async fn poll_network<D, S>(
    session: &mut CaptureSession,
    driver: &mut D,
    sink: &mut S,
    api_marker: &str,
) -> (usize, PageSignal)
where
    D: BrowserDriver + ?Sized,
    S: CaptureSink + ?Sized,
{
    let entries = match driver.capture_network_log().await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "network log unavailable, skipping poll");
            return (0, PageSignal::NoSignal);
        }
    };

    let mut batch = Vec::new();
    for entry in entries {
        if !entry.url.contains(api_marker) {
            continue;
        }
        if !session.seen_requests.insert(entry.request_id.clone()) {
            continue;
        }

        let body = match driver.fetch_response_body(&entry.request_id).await {
            Ok(body) => body,
            Err(e) => {
                session.failed_bodies += 1;
                tracing::warn!(
                    request_id = %entry.request_id,
                    url = %entry.url,
                    error = %e,
                    "skipping response whose body could not be fetched"
                );
                continue;
            }
        };

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => {
                let payload = RawPayload::probe(&value);
                if matches!(payload, RawPayload::Unknown) {
                    session.non_listing += 1;
                    tracing::warn!(
                        request_id = %entry.request_id,
                        url = %entry.url,
                        "skipping response that is not a listing page"
                    );
                    continue;
                }
                tracing::trace!(
                    request_id = %entry.request_id,
                    shape = payload.shape(),
                    "listing response"
                );
                batch.push(value);
            }
            Err(e) => {
                session.malformed += 1;
                tracing::warn!(
                    request_id = %entry.request_id,
                    url = %entry.url,
                    error = %e,
                    "skipping response that is not valid JSON"
                );
            }
        }
    }

    let signal = session.tracker.advance(batch.iter());

    let mut new_pages = 0;
    for value in batch {
        let Some(seq) = session.insert(value) else {
            continue;
        };
        new_pages += 1;
        if let Err(e) = sink.persist(seq, &session.payloads[seq]) {
            tracing::warn!(seq, error = %e, "failed to persist raw capture");
        }
    }
    (new_pages, signal)
}

/// Waits for the product container under the retry policy. Returns `false`
/// when the loop should fall back to window scrolling.
async fn find_container<D>(driver: &mut D, config: &CaptureConfig) -> bool
where
    D: BrowserDriver + ?Sized,
{
    let mut attempt = 1;
    loop {
        let err = match driver
            .find_element(CONTAINER_SELECTOR, config.container_timeout)
            .await
        {
            Ok(()) => return true,
            Err(e) => e,
        };
        if !config.retry.backoff("container-find", attempt, &err).await {
            tracing::warn!(
                selector = CONTAINER_SELECTOR,
                error = %err,
                "product container not found, using window scrolling"
            );
            return false;
        }
        attempt += 1;
    }
}

async fn scroll_once<D>(driver: &mut D, use_container: bool, distance: u32)
where
    D: BrowserDriver + ?Sized,
{
    if use_container {
        let script = format!(
            "(() => {{ const c = document.querySelector('{CONTAINER_SELECTOR}'); \
             if (!c) return false; const before = c.scrollTop; \
             c.scrollTop += {distance}; return c.scrollTop > before; }})()"
        );
        match driver.execute_script(&script).await {
            Ok(Value::Bool(true)) => return,
            Ok(_) => tracing::debug!("container did not move, scrolling window"),
            Err(e) => tracing::warn!(error = %e, "container scroll failed, scrolling window"),
        }
    }

    if let Err(e) = driver.scroll(distance).await {
        tracing::warn!(error = %e, distance, "window scroll failed");
    }
}

async fn wander<D>(driver: &mut D)
where
    D: BrowserDriver + ?Sized,
{
    let script = format!(
        "(() => {{ const cards = document.querySelectorAll(\"{PRODUCT_CARD_SELECTOR}\"); \
         if (cards.length === 0) return false; \
         cards[Math.floor(Math.random() * cards.length)]\
         .scrollIntoView({{behavior: 'smooth', block: 'center'}}); return true; }})()"
    );
    match driver.execute_script(&script).await {
        Ok(_) => tokio::time::sleep(WANDER_PAUSE).await,
        Err(e) => tracing::warn!(error = %e, "random product wander failed"),
    }
}
