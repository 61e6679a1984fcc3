use thiserror::Error;

/// Failures reported by a [`crate::BrowserDriver`] implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser could not be launched: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("element \"{selector}\" not found within {timeout_ms}ms")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    #[error("response body unavailable for request {request_id}: {reason}")]
    ResponseBody { request_id: String, reason: String },

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV error at {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("location could not be set to ({lat}, {lng}) after {attempts} attempts")]
    LocationNotSet { lat: f64, lng: f64, attempts: u32 },

    #[error("no listing payloads captured for {category} ({url})")]
    NoPayloadsCaptured { category: String, url: String },
}

impl ScraperError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
