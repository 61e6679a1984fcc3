//! Read-only analytical views over the canonical product rows.
//!
//! All groupings use ordered maps so output order is stable across runs.
//! Rows captured at the default location carry no coordinates and are left
//! out of every per-location grouping.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::products::ProductRow;

/// `(lat, lng)` of a row, or `None` when either is blank.
fn coordinates(row: &ProductRow) -> Option<(&str, &str)> {
    let (lat, lng) = (row.lat.trim(), row.lng.trim());
    (!lat.is_empty() && !lng.is_empty()).then_some((lat, lng))
}

/// Offer statistics for one delivery location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationOfferSummary {
    pub latitude: String,
    pub longitude: String,
    /// Distinct `variant_id`s seen at this location.
    pub unique_products: usize,
    /// Rows flagged as an offer (not deduplicated by variant).
    pub products_with_offers: usize,
    pub offer_percentage: f64,
}

/// A variant that sold at more than one price across more than one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceVariationRecord {
    pub variant_id: String,
    pub variant_name: String,
    pub distinct_prices: usize,
    pub distinct_locations: usize,
}

/// Share of offer rows within one category at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferPatternRecord {
    pub l1_category: String,
    pub l2_category: String,
    pub lat: String,
    pub lng: String,
    pub product_count: usize,
    pub offers_count: usize,
    pub offer_percentage: f64,
}

/// Groups rows by `(lat, lng)` and reports distinct products and offer share.
#[must_use]
pub fn summarize_locations(rows: &[ProductRow]) -> Vec<LocationOfferSummary> {
    let mut groups: BTreeMap<(&str, &str), (BTreeSet<&str>, usize)> = BTreeMap::new();

    for row in rows {
        let Some(point) = coordinates(row) else {
            continue;
        };
        let entry = groups.entry(point).or_default();
        entry.0.insert(row.variant_id.as_str());
        if row.is_offer() {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|((lat, lng), (variants, offers))| LocationOfferSummary {
            latitude: lat.to_string(),
            longitude: lng.to_string(),
            unique_products: variants.len(),
            products_with_offers: offers,
            offer_percentage: percentage(offers, variants.len()),
        })
        .collect()
}

/// Lists variants priced differently across locations, most price points first.
///
/// A variant qualifies only when it has more than one distinct selling price
/// AND was seen at more than one distinct location. Rows without coordinates
/// still contribute their price.
#[must_use]
pub fn price_variations(rows: &[ProductRow]) -> Vec<PriceVariationRecord> {
    struct Acc<'a> {
        name: &'a str,
        prices: BTreeSet<&'a str>,
        locations: BTreeSet<(&'a str, &'a str)>,
    }

    let mut groups: BTreeMap<&str, Acc<'_>> = BTreeMap::new();
    for row in rows {
        let acc = groups.entry(row.variant_id.as_str()).or_insert_with(|| Acc {
            name: row.variant_name.as_str(),
            prices: BTreeSet::new(),
            locations: BTreeSet::new(),
        });
        acc.prices.insert(row.selling_price.as_str());
        if let Some(point) = coordinates(row) {
            acc.locations.insert(point);
        }
    }

    let mut records: Vec<PriceVariationRecord> = groups
        .into_iter()
        .filter(|(_, acc)| acc.prices.len() > 1 && acc.locations.len() > 1)
        .map(|(variant_id, acc)| PriceVariationRecord {
            variant_id: variant_id.to_string(),
            variant_name: acc.name.to_string(),
            distinct_prices: acc.prices.len(),
            distinct_locations: acc.locations.len(),
        })
        .collect();

    records.sort_by(|a, b| b.distinct_prices.cmp(&a.distinct_prices));
    records
}

/// Groups rows by `(l1, l2, lat, lng)` and reports the offer share per group.
#[must_use]
pub fn offer_patterns(rows: &[ProductRow]) -> Vec<OfferPatternRecord> {
    let mut groups: BTreeMap<(&str, &str, &str, &str), (usize, usize)> = BTreeMap::new();

    for row in rows {
        let Some((lat, lng)) = coordinates(row) else {
            continue;
        };
        let entry = groups
            .entry((row.l1_category.as_str(), row.l2_category.as_str(), lat, lng))
            .or_default();
        entry.0 += 1;
        if row.is_offer() {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|((l1, l2, lat, lng), (count, offers))| OfferPatternRecord {
            l1_category: l1.to_string(),
            l2_category: l2.to_string(),
            lat: lat.to_string(),
            lng: lng.to_string(),
            product_count: count,
            offers_count: offers,
            offer_percentage: percentage(offers, count),
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
