pub mod capture;
#[cfg(feature = "chrome")]
pub mod chrome;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod geocode;
pub mod location;
pub mod normalize;
pub mod pagination;
pub mod payload;
pub mod process;
pub mod raw_store;
pub mod retry;
pub mod session;

pub use capture::{
    capture_category, run_capture, CaptureConfig, CaptureOutcome, CaptureSession, StopReason,
    TerminationPolicy, CONTAINER_SELECTOR,
};
#[cfg(feature = "chrome")]
pub use chrome::{ChromeDriver, ChromeOptions};
pub use dedup::DedupStore;
pub use driver::{BrowserDriver, NetworkEntry};
pub use error::{DriverError, ScraperError};
pub use export::{read_product_rows, write_records, CsvProductWriter, ProductSink};
pub use fingerprint::{product_fingerprint, ResponseKey};
pub use geocode::{NominatimGeocoder, ReverseGeocoder, UNKNOWN_LOCATION};
pub use location::{set_location, LocationConfig};
pub use normalize::{normalize, normalize_batch, today, BatchOutcome, NormalizeContext};
pub use pagination::{PageSignal, PaginationTracker};
pub use payload::RawPayload;
pub use process::{process_category_dir, ProcessSummary};
pub use raw_store::{list_category_dirs, load_raw_captures, CaptureSink, LoadedCapture, RawCaptureStore};
pub use retry::RetryPolicy;
pub use session::{
    CategoryFailure, CategoryResult, ScrapeTarget, SweepConfig, SweepController, SweepReport,
    SweepState,
};
