use std::path::PathBuf;

/// Lifetime of a product deduplication store during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupScope {
    /// One store per (location, category) capture run.
    Run,
    /// One store shared by every run of the sweep.
    Sweep,
}

impl std::fmt::Display for DedupScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupScope::Run => write!(f, "run"),
            DedupScope::Sweep => write!(f, "sweep"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub output_dir: PathBuf,
    pub storefront_host: String,
    /// Substring that identifies listing API responses in the network log.
    pub api_marker: String,
    pub max_scrolls: u32,
    pub stall_threshold: u32,
    pub scroll_stride_px: u32,
    pub scroll_stride_growth_px: u32,
    pub settle_min_ms: u64,
    pub settle_jitter_ms: u64,
    pub page_load_wait_ms: u64,
    pub retry_scroll_ceiling: u32,
    pub retry_max_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub container_timeout_secs: u64,
    pub inter_location_delay_ms: u64,
    pub dedup_scope: DedupScope,
    pub headless: bool,
    pub debug_screenshots: bool,
    pub geocoder_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("log_level", &self.log_level)
            .field("output_dir", &self.output_dir)
            .field("storefront_host", &self.storefront_host)
            .field("api_marker", &self.api_marker)
            .field("max_scrolls", &self.max_scrolls)
            .field("stall_threshold", &self.stall_threshold)
            .field("scroll_stride_px", &self.scroll_stride_px)
            .field("scroll_stride_growth_px", &self.scroll_stride_growth_px)
            .field("settle_min_ms", &self.settle_min_ms)
            .field("settle_jitter_ms", &self.settle_jitter_ms)
            .field("page_load_wait_ms", &self.page_load_wait_ms)
            .field("retry_scroll_ceiling", &self.retry_scroll_ceiling)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("container_timeout_secs", &self.container_timeout_secs)
            .field("inter_location_delay_ms", &self.inter_location_delay_ms)
            .field("dedup_scope", &self.dedup_scope)
            .field("headless", &self.headless)
            .field("debug_screenshots", &self.debug_screenshots)
            // Geocoder URLs sometimes carry an API key in the query string.
            .field("geocoder_url", &"[redacted]")
            .field("user_agent", &self.user_agent)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
