//! Loading of the externally supplied location and category lists.

use std::collections::HashSet;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::category::category_pattern;
use crate::products::{CategoryContext, GeoPoint};
use crate::ConfigError;

/// Load delivery locations from a CSV file with `latitude,longitude` headers.
///
/// Duplicate coordinates are dropped (first occurrence wins) with a warning.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, or if any
/// coordinate is out of range.
pub fn load_locations(path: &Path) -> Result<Vec<GeoPoint>, ConfigError> {
    let rows: Vec<GeoPoint> = read_csv(path)?;
    validate_locations(rows)
}

/// Load categories from a CSV file with
/// `l1_category,l1_category_id,l2_category,l2_category_id` headers.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_categories(path: &Path) -> Result<Vec<CategoryContext>, ConfigError> {
    let rows: Vec<CategoryContext> = read_csv(path)?;
    validate_categories(&rows)?;
    Ok(rows)
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ConfigError> {
    let file = std::fs::File::open(path).map_err(|e| ConfigError::InputFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file)
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ConfigError::InputFileParse {
            path: path.display().to_string(),
            source: e,
        })
}

fn validate_locations(rows: Vec<GeoPoint>) -> Result<Vec<GeoPoint>, ConfigError> {
    let mut seen: Vec<GeoPoint> = Vec::with_capacity(rows.len());

    for point in rows {
        if !(-90.0..=90.0).contains(&point.lat) {
            return Err(ConfigError::Validation(format!(
                "latitude {} is outside [-90, 90]",
                point.lat
            )));
        }
        if !(-180.0..=180.0).contains(&point.lng) {
            return Err(ConfigError::Validation(format!(
                "longitude {} is outside [-180, 180]",
                point.lng
            )));
        }
        if seen.contains(&point) {
            tracing::warn!(lat = point.lat, lng = point.lng, "dropping duplicate location");
            continue;
        }
        seen.push(point);
    }

    Ok(seen)
}

fn validate_categories(rows: &[CategoryContext]) -> Result<(), ConfigError> {
    let mut seen_patterns = HashSet::new();

    for ctx in rows {
        if ctx.l1_category.trim().is_empty() || ctx.l2_category.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "category names must be non-empty (ids {}/{})",
                ctx.l1_category_id, ctx.l2_category_id
            )));
        }

        for id in [&ctx.l1_category_id, &ctx.l2_category_id] {
            if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::Validation(format!(
                    "category '{} / {}' has non-numeric id '{}'",
                    ctx.l1_category, ctx.l2_category, id
                )));
            }
        }

        let pattern = category_pattern(ctx);
        if !seen_patterns.insert(pattern.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate category: '{pattern}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "inputs_test.rs"]
mod tests;
