pub mod analysis;
pub mod app_config;
pub mod category;
pub mod config;
pub mod inputs;
pub mod products;

use thiserror::Error;

pub use analysis::{
    offer_patterns, price_variations, summarize_locations, LocationOfferSummary,
    OfferPatternRecord, PriceVariationRecord,
};
pub use app_config::{AppConfig, DedupScope};
pub use category::{
    category_pattern, category_pattern_from_url, category_url, parse_category_pattern, slugify,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use inputs::{load_categories, load_locations};
pub use products::{CanonicalProduct, CategoryContext, GeoPoint, ProductRow};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read input file {path}: {source}")]
    InputFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse input file {path}: {source}")]
    InputFileParse {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("input validation failed: {0}")]
    Validation(String),
}
