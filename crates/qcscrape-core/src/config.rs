use crate::app_config::{AppConfig, DedupScope};
use crate::ConfigError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if any variable holds a value that cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if any variable holds a value that cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every variable is optional. The lookup is injected so the parsing rules can
/// be tested against a plain `HashMap` without touching the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(
                var,
                "expected one of true/false/1/0/yes/no".to_string(),
            )
        })
    };

    let log_level = or_default("QCSCRAPE_LOG_LEVEL", "info");
    let output_dir = PathBuf::from(or_default("QCSCRAPE_OUTPUT_DIR", "scrape_data"));
    let storefront_host = or_default("QCSCRAPE_STOREFRONT_HOST", "blinkit.com");
    let api_marker = or_default("QCSCRAPE_API_MARKER", "v1/layout/listing_widgets");

    let max_scrolls = parse_u32("QCSCRAPE_MAX_SCROLLS", "15")?;
    let stall_threshold = parse_u32("QCSCRAPE_STALL_THRESHOLD", "3")?;
    if stall_threshold == 0 {
        return Err(invalid(
            "QCSCRAPE_STALL_THRESHOLD",
            "must be at least 1".to_string(),
        ));
    }
    let scroll_stride_px = parse_u32("QCSCRAPE_SCROLL_STRIDE_PX", "500")?;
    let scroll_stride_growth_px = parse_u32("QCSCRAPE_SCROLL_STRIDE_GROWTH_PX", "250")?;
    let settle_min_ms = parse_u64("QCSCRAPE_SETTLE_MIN_MS", "3000")?;
    let settle_jitter_ms = parse_u64("QCSCRAPE_SETTLE_JITTER_MS", "1000")?;
    let page_load_wait_ms = parse_u64("QCSCRAPE_PAGE_LOAD_WAIT_MS", "10000")?;
    let retry_scroll_ceiling = parse_u32("QCSCRAPE_RETRY_SCROLL_CEILING", "5")?;
    let retry_max_attempts = parse_u32("QCSCRAPE_RETRY_MAX_ATTEMPTS", "3")?;
    let retry_backoff_base_ms = parse_u64("QCSCRAPE_RETRY_BACKOFF_BASE_MS", "2000")?;
    let container_timeout_secs = parse_u64("QCSCRAPE_CONTAINER_TIMEOUT_SECS", "20")?;
    let inter_location_delay_ms = parse_u64("QCSCRAPE_INTER_LOCATION_DELAY_MS", "5000")?;

    let dedup_scope = parse_dedup_scope(&or_default("QCSCRAPE_DEDUP_SCOPE", "run"))
        .ok_or_else(|| invalid("QCSCRAPE_DEDUP_SCOPE", "expected 'run' or 'sweep'".to_string()))?;

    let headless = parse_bool("QCSCRAPE_HEADLESS", "true")?;
    let debug_screenshots = parse_bool("QCSCRAPE_DEBUG_SCREENSHOTS", "false")?;

    let geocoder_url = or_default(
        "QCSCRAPE_GEOCODER_URL",
        "https://nominatim.openstreetmap.org",
    );
    let user_agent = or_default("QCSCRAPE_USER_AGENT", DEFAULT_USER_AGENT);
    let request_timeout_secs = parse_u64("QCSCRAPE_REQUEST_TIMEOUT_SECS", "30")?;

    Ok(AppConfig {
        log_level,
        output_dir,
        storefront_host,
        api_marker,
        max_scrolls,
        stall_threshold,
        scroll_stride_px,
        scroll_stride_growth_px,
        settle_min_ms,
        settle_jitter_ms,
        page_load_wait_ms,
        retry_scroll_ceiling,
        retry_max_attempts,
        retry_backoff_base_ms,
        container_timeout_secs,
        inter_location_delay_ms,
        dedup_scope,
        headless,
        debug_screenshots,
        geocoder_url,
        user_agent,
        request_timeout_secs,
    })
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_dedup_scope(s: &str) -> Option<DedupScope> {
    match s.trim().to_ascii_lowercase().as_str() {
        "run" => Some(DedupScope::Run),
        "sweep" => Some(DedupScope::Sweep),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
