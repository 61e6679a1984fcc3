//! Offline commands: re-normalizing raw captures and writing the reports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use qcscrape_core::{
    category_pattern, load_categories, offer_patterns, parse_category_pattern, price_variations,
    summarize_locations, AppConfig, CategoryContext, DedupScope,
};
use qcscrape_scraper::{
    list_category_dirs, process_category_dir, read_product_rows, today, write_records,
    CsvProductWriter, DedupStore,
};

pub(crate) const PRODUCTS_FILE: &str = "products.csv";
pub(crate) const SUMMARY_FILE: &str = "summary.csv";
pub(crate) const PRICE_VARIATIONS_FILE: &str = "price_variations.csv";
pub(crate) const OFFER_PATTERNS_FILE: &str = "offer_patterns.csv";

pub(crate) fn products_path(config: &AppConfig) -> PathBuf {
    config.output_dir.join(PRODUCTS_FILE)
}

/// Normalizes raw captures for one category pattern, or for every category
/// directory under the output root, and appends them to the product CSV.
///
/// # Errors
///
/// Returns an error if the requested pattern has no directory, the
/// categories file cannot be loaded, or writing fails.
pub(crate) fn run_process(
    config: &AppConfig,
    pattern: Option<&str>,
    categories_file: Option<&Path>,
) -> anyhow::Result<()> {
    let names = match categories_file {
        Some(path) => category_names(path)?,
        None => HashMap::new(),
    };

    let dirs = match pattern {
        Some(pattern) => {
            let dir = config.output_dir.join(pattern);
            if !dir.is_dir() {
                anyhow::bail!("no raw captures for category '{pattern}' at {}", dir.display());
            }
            vec![(pattern.to_string(), dir)]
        }
        None => list_category_dirs(&config.output_dir)
            .with_context(|| format!("failed to list {}", config.output_dir.display()))?,
    };

    let date = today();
    let mut writer = CsvProductWriter::new(products_path(config));
    let mut sweep_dedup = DedupStore::new();
    let mut total = 0;

    for (pattern, dir) in dirs {
        let context = resolve_context(&pattern, &names);
        let mut run_dedup = DedupStore::new();
        let dedup = match config.dedup_scope {
            DedupScope::Run => &mut run_dedup,
            DedupScope::Sweep => &mut sweep_dedup,
        };
        match process_category_dir(&dir, &context, &date, dedup, &mut writer) {
            Ok(summary) => total += summary.products_written,
            Err(e) => {
                tracing::error!(category = %pattern, error = %e, "processing failed, skipping category");
            }
        }
    }

    println!("wrote {total} products to {}", writer.path().display());
    Ok(())
}

/// Normalizes whatever pages a failed capture left on disk. Returns `false`
/// when nothing was processed.
pub(crate) fn salvage_category(config: &AppConfig, pattern: &str) -> bool {
    if !config.output_dir.join(pattern).is_dir() {
        return false;
    }
    tracing::warn!(category = %pattern, "capture failed, processing the pages it saved");
    match run_process(config, Some(pattern), None) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(category = %pattern, error = %e, "processing saved pages failed");
            false
        }
    }
}

/// Reads the product CSV and writes the three analytical reports next to it.
///
/// # Errors
///
/// Returns an error if the product CSV cannot be read or a report cannot be
/// written.
pub(crate) fn run_analyze(config: &AppConfig, input: Option<&Path>) -> anyhow::Result<()> {
    let input = input.map_or_else(|| products_path(config), Path::to_path_buf);
    let rows = read_product_rows(&input)
        .with_context(|| format!("failed to read products from {}", input.display()))?;
    tracing::info!(rows = rows.len(), input = %input.display(), "analyzing products");

    let summary_path = config.output_dir.join(SUMMARY_FILE);
    write_records(&summary_path, &summarize_locations(&rows))?;
    println!("location summary: {}", summary_path.display());

    let variations = price_variations(&rows);
    if variations.is_empty() {
        println!("no products vary in price across locations");
    } else {
        let path = config.output_dir.join(PRICE_VARIATIONS_FILE);
        write_records(&path, &variations)?;
        println!("price variations ({}): {}", variations.len(), path.display());
    }

    let patterns_path = config.output_dir.join(OFFER_PATTERNS_FILE);
    write_records(&patterns_path, &offer_patterns(&rows))?;
    println!("offer patterns: {}", patterns_path.display());
    Ok(())
}

fn category_names(path: &Path) -> anyhow::Result<HashMap<String, CategoryContext>> {
    let categories = load_categories(path)
        .with_context(|| format!("failed to load categories from {}", path.display()))?;
    Ok(categories
        .into_iter()
        .map(|ctx| (category_pattern(&ctx), ctx))
        .collect())
}

/// Display names from the categories file when known, else the slugs the
/// pattern itself carries.
fn resolve_context(pattern: &str, names: &HashMap<String, CategoryContext>) -> CategoryContext {
    names
        .get(pattern)
        .cloned()
        .or_else(|| parse_category_pattern(pattern))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use qcscrape_core::{load_app_config_from_env, GeoPoint};
    use qcscrape_scraper::{read_product_rows, CaptureSink, RawCaptureStore};
    use serde_json::json;

    use super::*;

    const PATTERN: &str = "munchies_bhujia-mixtures_1237_1178";

    fn config_in(dir: &Path) -> AppConfig {
        let mut config = load_app_config_from_env().expect("default config");
        config.output_dir = dir.to_path_buf();
        config
    }

    fn named(l1: &str, l2: &str) -> CategoryContext {
        CategoryContext {
            l1_category: l1.to_string(),
            l1_category_id: "1237".to_string(),
            l2_category: l2.to_string(),
            l2_category_id: "1178".to_string(),
        }
    }

    #[test]
    fn resolve_context_prefers_categories_file() {
        let ctx = named("Munchies", "Bhujia Mixtures");
        let names = HashMap::from([(category_pattern(&ctx), ctx.clone())]);
        assert_eq!(
            resolve_context("munchies_bhujia-mixtures_1237_1178", &names),
            ctx
        );
    }

    #[test]
    fn resolve_context_falls_back_to_slugs() {
        let ctx = resolve_context("munchies_bhujia-mixtures_1237_1178", &HashMap::new());
        assert_eq!(ctx, named("munchies", "bhujia-mixtures"));
    }

    #[test]
    fn resolve_context_defaults_for_free_form_patterns() {
        assert_eq!(
            resolve_context("shop_snacks", &HashMap::new()),
            CategoryContext::default()
        );
    }

    #[test]
    fn salvage_processes_pages_left_by_failed_capture() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = config_in(tmp.path());
        let mut store = RawCaptureStore::new(
            tmp.path(),
            PATTERN,
            "https://blinkit.com/cn/munchies/bhujia-mixtures/cid/1237/1178",
            Some(GeoPoint::new(28.6139, 77.209)),
            None,
        );
        let page = json!({"widgets": [{"products": [{
            "id": 101,
            "name": "Aloo Bhujia",
            "variant": "200 g",
            "price": {"selling_price": "₹50", "mrp": "₹55"}
        }]}]});
        store.persist(0, &page).expect("persist");

        assert!(salvage_category(&config, PATTERN));

        let rows = read_product_rows(&products_path(&config)).expect("products csv");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].variant_id, "101");
    }

    #[test]
    fn salvage_without_saved_pages_does_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = config_in(tmp.path());

        assert!(!salvage_category(&config, PATTERN));
        assert!(!products_path(&config).exists());
    }
}
