//! Offline re-normalization of raw captures already on disk.

use std::path::Path;

use qcscrape_core::CategoryContext;

use crate::dedup::DedupStore;
use crate::error::ScraperError;
use crate::export::ProductSink;
use crate::normalize::{normalize_batch, NormalizeContext};
use crate::raw_store::load_raw_captures;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    pub files: usize,
    pub products_written: usize,
    pub duplicates: usize,
    pub unknown_payloads: usize,
}

/// Normalizes every capture in `dir` and appends new products to `sink`.
///
/// Each capture is stamped with the location recorded alongside it.
///
/// # Errors
///
/// Returns [`ScraperError`] if `dir` cannot be listed or `sink` fails.
pub fn process_category_dir<P>(
    dir: &Path,
    category: &CategoryContext,
    date: &str,
    dedup: &mut DedupStore,
    sink: &mut P,
) -> Result<ProcessSummary, ScraperError>
where
    P: ProductSink + ?Sized,
{
    let captures = load_raw_captures(dir)?;
    let mut summary = ProcessSummary {
        files: captures.len(),
        ..ProcessSummary::default()
    };

    for capture in &captures {
        let ctx = NormalizeContext {
            category,
            location: capture.location,
            date,
        };
        let batch = normalize_batch([&capture.payload], &ctx, dedup);
        summary.duplicates += batch.duplicates;
        summary.unknown_payloads += batch.unknown_payloads;
        if !batch.products.is_empty() {
            summary.products_written += sink.append(&batch.products)?;
        }
    }

    tracing::info!(
        dir = %dir.display(),
        files = summary.files,
        products = summary.products_written,
        duplicates = summary.duplicates,
        unknown_payloads = summary.unknown_payloads,
        "processed raw captures"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use qcscrape_core::{CanonicalProduct, GeoPoint};
    use serde_json::json;

    use super::*;
    use crate::raw_store::{CaptureSink, RawCaptureStore};

    #[derive(Default)]
    struct VecSink(Vec<CanonicalProduct>);

    impl ProductSink for VecSink {
        fn append(&mut self, products: &[CanonicalProduct]) -> Result<usize, ScraperError> {
            self.0.extend_from_slice(products);
            Ok(products.len())
        }
    }

    fn widget_page(id: &str) -> serde_json::Value {
        json!({
            "widgets": [{
                "products": [{
                    "id": id,
                    "name": "Aloo Bhujia",
                    "price": {"selling_price": 45, "mrp": 50},
                    "is_in_stock": true
                }]
            }]
        })
    }

    #[test]
    fn reprocesses_with_stored_location_and_dedups() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let point = GeoPoint::new(28.6139, 77.209);
        let mut store = RawCaptureStore::new(
            tmp.path(),
            "munchies_bhujia_1_2",
            "https://blinkit.com/cn/munchies/bhujia/cid/1/2",
            Some(point),
            None,
        );
        store.persist(0, &widget_page("101")).expect("persist");
        store.persist(1, &widget_page("101")).expect("persist");
        store.persist(2, &json!({"unrelated": true})).expect("persist");

        let category = CategoryContext::default();
        let mut sink = VecSink::default();
        let summary = process_category_dir(
            store.dir(),
            &category,
            "2024-01-01",
            &mut DedupStore::new(),
            &mut sink,
        )
        .expect("process");

        assert_eq!(summary.files, 3);
        assert_eq!(summary.products_written, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.unknown_payloads, 1);
        assert_eq!(sink.0[0].location, Some(point));
        assert_eq!(sink.0[0].variant_id, "101");
    }
}
