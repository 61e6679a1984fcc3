//! Canonical product CSV and the analytical CSV reports.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use qcscrape_core::{CanonicalProduct, ProductRow};
use serde::Serialize;

use crate::error::ScraperError;

/// Destination for deduplicated canonical products.
pub trait ProductSink {
    /// Appends `products`, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the products cannot be stored.
    fn append(&mut self, products: &[CanonicalProduct]) -> Result<usize, ScraperError>;
}

/// Appends canonical products to a CSV file, writing the header only when the
/// file is new or empty.
#[derive(Debug, Clone)]
pub struct CsvProductWriter {
    path: PathBuf,
}

impl CsvProductWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn csv_err(&self, source: csv::Error) -> ScraperError {
        ScraperError::Csv {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl ProductSink for CsvProductWriter {
    fn append(&mut self, products: &[CanonicalProduct]) -> Result<usize, ScraperError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ScraperError::io(parent, e))?;
        }

        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ScraperError::io(&self.path, e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        for product in products {
            writer
                .serialize(product.to_row())
                .map_err(|e| self.csv_err(e))?;
        }
        writer
            .flush()
            .map_err(|e| ScraperError::io(&self.path, e))?;

        tracing::info!(
            path = %self.path.display(),
            rows = products.len(),
            "appended products to CSV"
        );
        Ok(products.len())
    }
}

/// Reads the canonical CSV back as text rows.
///
/// # Errors
///
/// Returns [`ScraperError::Io`] if the file cannot be opened and
/// [`ScraperError::Csv`] if a row does not match the canonical columns.
pub fn read_product_rows(path: &Path) -> Result<Vec<ProductRow>, ScraperError> {
    let file = std::fs::File::open(path).map_err(|e| ScraperError::io(path, e))?;
    csv::Reader::from_reader(file)
        .deserialize()
        .collect::<Result<Vec<ProductRow>, _>>()
        .map_err(|e| ScraperError::Csv {
            path: path.display().to_string(),
            source: e,
        })
}

/// Writes `records` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`ScraperError`] if the file cannot be created or written.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), ScraperError> {
    let csv_err = |source| ScraperError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        writer.serialize(record).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| ScraperError::io(path, e))
}

#[cfg(test)]
mod tests {
    use qcscrape_core::{summarize_locations, GeoPoint};

    use super::*;

    fn product(variant_id: &str, location: Option<GeoPoint>) -> CanonicalProduct {
        CanonicalProduct {
            date: "2025-03-01".to_string(),
            location,
            l1_category: "Munchies".to_string(),
            l1_category_id: "1237".to_string(),
            l2_category: "Bhujia Mixtures".to_string(),
            l2_category_id: "1178".to_string(),
            store_id: "30961".to_string(),
            variant_id: variant_id.to_string(),
            variant_name: "Aloo Bhujia, Spicy 200 g".to_string(),
            group_id: "58201".to_string(),
            selling_price: "52".to_string(),
            mrp: "55".to_string(),
            in_stock: true,
            inventory: 12,
            is_offer: true,
            image_url: String::new(),
            brand_id: "411".to_string(),
            brand: "Haldiram's".to_string(),
        }
    }

    const HEADER: &str = "date,lat,lng,l1_category,l1_category_id,l2_category,l2_category_id,\
store_id,variant_id,variant_name,group_id,selling_price,mrp,in_stock,inventory,is_offer,\
image_url,brand_id,brand";

    #[test]
    fn header_written_once_across_appends() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = CsvProductWriter::new(tmp.path().join("products.csv"));
        writer.append(&[product("1", None)]).unwrap();
        writer.append(&[product("2", None), product("3", None)]).unwrap();

        let text = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines.len(), 4);
        assert_eq!(text.matches("date,lat").count(), 1);
    }

    #[test]
    fn header_written_when_existing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("products.csv");
        std::fs::write(&path, "").unwrap();
        CsvProductWriter::new(&path).append(&[product("1", None)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out/products.csv");
        CsvProductWriter::new(&path).append(&[product("1", None)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn rows_round_trip_through_reader() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = CsvProductWriter::new(tmp.path().join("products.csv"));
        let products = vec![
            product("1", Some(GeoPoint::new(28.6139, 77.209))),
            product("2", None),
        ];
        writer.append(&products).unwrap();

        let rows = read_product_rows(writer.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], products[0].to_row());
        assert_eq!(rows[0].variant_name, "Aloo Bhujia, Spicy 200 g");
        assert_eq!(rows[1].lat, "");
        assert_eq!(rows[1].in_stock, "Yes");
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let err = read_product_rows(Path::new("/nonexistent/products.csv")).unwrap_err();
        assert!(matches!(err, ScraperError::Io { .. }), "got: {err:?}");
    }

    #[test]
    fn write_records_replaces_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("summary.csv");
        let rows = vec![product("1", Some(GeoPoint::new(1.0, 2.0))).to_row()];
        write_records(&path, &summarize_locations(&rows)).unwrap();
        write_records(&path, &summarize_locations(&rows)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "latitude,longitude,unique_products,products_with_offers,offer_percentage\n1,2,1,1,100.0\n"
        );
    }
}
