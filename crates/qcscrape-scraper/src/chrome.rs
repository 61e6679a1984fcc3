//! [`BrowserDriver`] backed by a local Chromium over the DevTools protocol.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Handler, Page};
use futures::StreamExt;
use qcscrape_core::AppConfig;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::driver::{BrowserDriver, NetworkEntry};
use crate::error::DriverError;

const FIND_POLL: Duration = Duration::from_millis(250);

/// Hides the most common automation fingerprints before any page script runs.
const STEALTH_SCRIPT: &str = "Object.defineProperty(navigator, 'webdriver', {get: () => undefined}); \
     Object.defineProperty(navigator, 'languages', {get: () => ['en-US', 'en']}); \
     window.chrome = window.chrome || {runtime: {}};";

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub user_agent: String,
    pub window_size: (u32, u32),
    /// Browser binary; located automatically when `None`.
    pub executable: Option<PathBuf>,
}

impl ChromeOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            window_size: (1920, 1080),
            executable: None,
        }
    }
}

pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
    responses: mpsc::UnboundedReceiver<NetworkEntry>,
}

impl ChromeDriver {
    /// Launches the browser, opens a blank tab and starts recording network
    /// responses.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Launch`] if the browser cannot be started or
    /// the tab cannot be prepared.
    pub async fn launch(options: &ChromeOptions) -> Result<Self, DriverError> {
        let (width, height) = options.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg(format!("--user-agent={}", options.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &options.executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        tracing::info!(headless = options.headless, "launching browser");
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        let handler_task = spawn_handler_task(handler);

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
            .map_err(|e| DriverError::Launch(format!("stealth script: {e}")))?;
        page.execute(EnableParams::default())
            .await
            .map_err(|e| DriverError::Launch(format!("network domain: {e}")))?;

        let events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| DriverError::Launch(format!("response listener: {e}")))?;
        let (tx, responses) = mpsc::unbounded_channel();
        let listener_task = tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.next().await {
                let entry = NetworkEntry {
                    request_id: event.request_id.inner().clone(),
                    url: event.response.url.clone(),
                };
                if tx.send(entry).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            page,
            handler_task,
            listener_task,
            responses,
        })
    }

    /// Closes the browser and stops the background tasks.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser did not close cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!(error = %e, "browser process did not exit cleanly");
        }
        self.listener_task.abort();
        self.handler_task.abort();
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        self.listener_task.abort();
        self.handler_task.abort();
    }
}

fn spawn_handler_task(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::warn!(error = %e, "browser handler event error");
            }
        }
        tracing::debug!("browser handler stopped");
    })
}

fn protocol(e: impl std::fmt::Display) -> DriverError {
    DriverError::Protocol(e.to_string())
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value, DriverError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn find_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(DriverError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(FIND_POLL).await;
        }
    }

    async fn scroll(&mut self, distance: u32) -> Result<(), DriverError> {
        self.execute_script(&format!("window.scrollBy(0, {distance}); true"))
            .await
            .map(|_| ())
    }

    async fn capture_network_log(&mut self) -> Result<Vec<NetworkEntry>, DriverError> {
        let mut entries = Vec::new();
        while let Ok(entry) = self.responses.try_recv() {
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn fetch_response_body(&mut self, request_id: &str) -> Result<String, DriverError> {
        let body_err = |reason: String| DriverError::ResponseBody {
            request_id: request_id.to_string(),
            reason,
        };
        let response = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(|e| body_err(e.to_string()))?;
        if response.result.base64_encoded {
            return Err(body_err("body is base64-encoded binary".to_string()));
        }
        Ok(response.result.body.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), DriverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(protocol)?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().build(), path)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), DriverError> {
        self.page.reload().await.map_err(protocol)?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, DriverError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }
}
