//! The browser automation seam.
//!
//! Everything the capture core needs from a real browser goes through
//! [`BrowserDriver`], so the scroll loop and the session controller can be
//! exercised against a scripted in-memory driver.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverError;

/// One observed network response, as recorded by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub request_id: String,
    pub url: String,
}

#[async_trait]
pub trait BrowserDriver: Send {
    /// Loads `url` in the current tab.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Evaluates `script` in the page and returns its JSON-encoded result.
    async fn execute_script(&mut self, script: &str) -> Result<Value, DriverError>;

    /// Waits until `selector` matches an element, or fails after `timeout`.
    async fn find_element(&mut self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Scrolls the whole window down by `distance` pixels.
    async fn scroll(&mut self, distance: u32) -> Result<(), DriverError>;

    /// Drains the network responses recorded since the previous call.
    async fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>, DriverError>;

    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, DriverError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError>;

    /// Reloads the current page.
    async fn reload(&mut self) -> Result<(), DriverError>;

    async fn current_url(&mut self) -> Result<String, DriverError>;
}
