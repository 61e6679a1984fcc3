//! Scripted in-memory browser and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use qcscrape_core::{CanonicalProduct, CategoryContext, DedupScope};
use qcscrape_scraper::{
    BrowserDriver, CaptureConfig, CaptureSink, DriverError, LocationConfig, NetworkEntry,
    ProductSink, RetryPolicy, ReverseGeocoder, ScraperError, SweepConfig,
};
use serde_json::{json, Value};

pub const API_URL: &str = "https://blinkit.com/v1/layout/listing_widgets?page=";

/// One response the fake browser reports. `body: None` makes the body fetch fail.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: String,
    pub body: Option<String>,
}

impl Response {
    pub fn listing(body: impl Into<String>) -> Self {
        Self {
            url: API_URL.to_string(),
            body: Some(body.into()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            url: API_URL.to_string(),
            body: None,
        }
    }

    pub fn other(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            body: Some(body.to_string()),
        }
    }
}

/// Responses per network-log poll: element `i` is returned by the `i`-th poll
/// after the page was loaded.
pub type Ticks = Vec<Vec<Response>>;

/// A browser whose network traffic is scripted per page.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    routes: HashMap<String, Ticks>,
    reload_routes: HashMap<String, Ticks>,
    queue: VecDeque<Vec<Response>>,
    bodies: HashMap<String, Option<String>>,
    next_id: usize,
    current: String,
    pub missing_selectors: HashSet<String>,
    pub failing_urls: HashSet<String>,
    /// Result of `execute_script`; `None` makes every script fail.
    pub script_result: Option<Value>,
    pub navigations: Vec<String>,
    pub find_calls: Vec<String>,
    pub window_scrolls: usize,
    pub reloads: usize,
    pub polls: usize,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            script_result: Some(Value::Bool(true)),
            ..Self::default()
        }
    }

    /// A driver already sitting on a page that will produce `ticks`.
    pub fn on_page(ticks: Ticks) -> Self {
        let mut driver = Self::new();
        driver.queue = ticks.into();
        driver
    }

    pub fn route(mut self, url: &str, ticks: Ticks) -> Self {
        self.routes.insert(url.to_string(), ticks);
        self
    }

    pub fn reload_route(mut self, url: &str, ticks: Ticks) -> Self {
        self.reload_routes.insert(url.to_string(), ticks);
        self
    }

    pub fn missing(mut self, selectors: &[&str]) -> Self {
        self.missing_selectors
            .extend(selectors.iter().map(|s| (*s).to_string()));
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    pub fn find_count(&self, selector: &str) -> usize {
        self.find_calls.iter().filter(|s| *s == selector).count()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.navigations.push(url.to_string());
        if self.failing_urls.contains(url) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        self.current = url.to_string();
        self.queue = self.routes.get(url).cloned().unwrap_or_default().into();
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str) -> Result<Value, DriverError> {
        self.script_result
            .clone()
            .ok_or_else(|| DriverError::Script("scripts disabled".to_string()))
    }

    async fn find_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.find_calls.push(selector.to_string());
        if self.missing_selectors.contains(selector) {
            return Err(DriverError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }

    async fn scroll(&mut self, _distance: u32) -> Result<(), DriverError> {
        self.window_scrolls += 1;
        Ok(())
    }

    async fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>, DriverError> {
        self.polls += 1;
        let Some(batch) = self.queue.pop_front() else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::with_capacity(batch.len());
        for response in batch {
            self.next_id += 1;
            let request_id = format!("req-{}", self.next_id);
            self.bodies.insert(request_id.clone(), response.body);
            entries.push(NetworkEntry {
                request_id,
                url: response.url,
            });
        }
        Ok(entries)
    }

    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, DriverError> {
        match self.bodies.get(request_id) {
            Some(Some(body)) => Ok(body.clone()),
            _ => Err(DriverError::ResponseBody {
                request_id: request_id.to_string(),
                reason: "No resource with given identifier found".to_string(),
            }),
        }
    }

    async fn screenshot(&mut self, _path: &Path) -> Result<(), DriverError> {
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), DriverError> {
        self.reloads += 1;
        self.queue = self
            .reload_routes
            .get(&self.current)
            .cloned()
            .unwrap_or_default()
            .into();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.current.clone())
    }
}

pub struct FixedGeocoder(pub &'static str);

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn resolve(&self, _lat: f64, _lng: f64) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemorySink(pub Vec<CanonicalProduct>);

impl ProductSink for MemorySink {
    fn append(&mut self, products: &[CanonicalProduct]) -> Result<usize, ScraperError> {
        self.0.extend_from_slice(products);
        Ok(products.len())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCaptures(pub Vec<(usize, Value)>);

impl CaptureSink for MemoryCaptures {
    fn persist(&mut self, seq: usize, payload: &Value) -> Result<(), ScraperError> {
        self.0.push((seq, payload.clone()));
        Ok(())
    }
}

pub fn capture_config(max_scrolls: u32, stall_threshold: u32) -> CaptureConfig {
    CaptureConfig {
        api_marker: "v1/layout/listing_widgets".to_string(),
        max_scrolls,
        stall_threshold,
        scroll_stride_px: 800,
        scroll_stride_growth_px: 200,
        settle_min: Duration::ZERO,
        settle_jitter: Duration::ZERO,
        page_load_wait: Duration::ZERO,
        container_timeout: Duration::ZERO,
        retry_scroll_ceiling: 4,
        retry: RetryPolicy::new(2, 0),
        wander: false,
        screenshot_dir: None,
    }
}

pub fn sweep_config(output_dir: &Path, dedup_scope: DedupScope) -> SweepConfig {
    SweepConfig {
        storefront_host: "blinkit.com".to_string(),
        output_dir: PathBuf::from(output_dir),
        dedup_scope,
        inter_location_delay: Duration::ZERO,
        capture: capture_config(10, 2),
        location: LocationConfig {
            retry: RetryPolicy::new(2, 0),
            selector_timeout: Duration::ZERO,
            ui_settle: Duration::ZERO,
            confirm_timeout: Duration::ZERO,
            confirm_poll: Duration::ZERO,
        },
    }
}

pub fn category(l1: &str, l1_id: &str, l2: &str, l2_id: &str) -> CategoryContext {
    CategoryContext {
        l1_category: l1.to_string(),
        l1_category_id: l1_id.to_string(),
        l2_category: l2.to_string(),
        l2_category_id: l2_id.to_string(),
    }
}

/// A widget-shaped page (no pagination block) carrying one product per id.
pub fn widget_page(ids: &[u32]) -> String {
    let products: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Product {id}"),
                "variant": "200 g",
                "group_id": id * 10,
                "store_id": 31337,
                "price": {"selling_price": 40 + id, "mrp": 50 + id},
                "is_in_stock": true,
                "inventory": 12,
                "brand_id": 7,
                "brand": "Haldiram's",
                "image_url": format!("https://cdn.example.com/{id}.png")
            })
        })
        .collect();
    json!({"widgets": [{"products": products}]}).to_string()
}

/// A snippet-shaped page announcing its place in a walk over `total` items.
pub fn snippet_page(ids: &[u32], page_index: u64, processed: u64, total: u64) -> String {
    let snippets: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "data": {
                    "name": {"text": format!("Snack {id}")},
                    "variant": {"text": "150 g"},
                    "normal_price": {"text": format!("₹{}", 20 + id)},
                    "mrp": {"text": format!("₹{}", 25 + id)},
                    "brand_name": {"text": "Bikaji"},
                    "image": {"url": format!("https://cdn.example.com/s{id}.png")},
                    "merchant_id": 31337,
                    "product_id": id,
                    "group_id": id * 10,
                    "is_sold_out": false,
                    "inventory": 5
                },
                "tracking": {"common_attributes": {"l2_category": "Bhujia", "l2_category_id": "1178"}}
            })
        })
        .collect();
    json!({
        "response": {
            "snippets": snippets,
            "pagination": {
                "next_url": format!(
                    "/v1/layout/listing_widgets?offset={processed}&limit=15&page_index={page_index}\
                     &total_entities_processed={processed}&total_pagination_items={total}"
                )
            }
        }
    })
    .to_string()
}
