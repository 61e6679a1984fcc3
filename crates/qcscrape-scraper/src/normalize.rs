//! Mapping of raw listing payloads to [`CanonicalProduct`] records.
//!
//! Normalization never fails: an unrecognized payload yields no products and
//! is counted by [`normalize_batch`].

use qcscrape_core::{CanonicalProduct, CategoryContext, GeoPoint};
use serde_json::Value;

use crate::dedup::DedupStore;
use crate::payload::{
    is_truthy, RawPayload, SnippetData, SnippetTracking, TextField, WidgetProduct,
};

/// Everything about a listing page that the payload itself does not carry.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub category: &'a CategoryContext,
    pub location: Option<GeoPoint>,
    /// Scrape date, `YYYY-MM-DD`.
    pub date: &'a str,
}

/// Products recovered from a batch of payloads, after deduplication.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub products: Vec<CanonicalProduct>,
    pub unknown_payloads: usize,
    pub duplicates: usize,
}

/// Today's local date as `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Normalizes one classified payload.
#[must_use]
pub fn normalize(payload: &RawPayload, ctx: &NormalizeContext<'_>) -> Vec<CanonicalProduct> {
    match payload {
        RawPayload::Widget(page) => page
            .widgets
            .iter()
            .flat_map(|w| w.products.iter())
            .map(|p| normalize_widget_product(p, ctx))
            .collect(),
        RawPayload::Snippet(page) => page
            .response
            .snippets
            .iter()
            .filter_map(|s| {
                let data = s.data.as_ref()?;
                let tracking = s.tracking.as_ref().or(data.tracking.as_ref());
                Some(normalize_snippet(data, tracking, ctx))
            })
            .collect(),
        RawPayload::Unknown => Vec::new(),
    }
}

/// Classifies and normalizes every payload, keeping only products `dedup`
/// has not seen.
pub fn normalize_batch<'a, I>(
    payloads: I,
    ctx: &NormalizeContext<'_>,
    dedup: &mut DedupStore,
) -> BatchOutcome
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut outcome = BatchOutcome::default();

    for value in payloads {
        let payload = RawPayload::probe(value);
        if matches!(payload, RawPayload::Unknown) {
            outcome.unknown_payloads += 1;
            continue;
        }
        let products = normalize(&payload, ctx);
        let found = products.len();
        let kept = dedup.retain_new(products);
        tracing::trace!(shape = payload.shape(), found, kept = kept.len(), "normalized payload");
        outcome.duplicates += found - kept.len();
        outcome.products.extend(kept);
    }

    tracing::debug!(
        products = outcome.products.len(),
        duplicates = outcome.duplicates,
        unknown_payloads = outcome.unknown_payloads,
        "normalized payload batch"
    );
    outcome
}

fn normalize_widget_product(p: &WidgetProduct, ctx: &NormalizeContext<'_>) -> CanonicalProduct {
    let (selling_price, mrp) = p.price.as_ref().map_or_else(
        || (String::new(), String::new()),
        |price| (strip_currency(&price.selling_price), strip_currency(&price.mrp)),
    );

    let is_offer = p.is_offer.as_ref().is_some_and(is_truthy) || price_gt(&mrp, &selling_price);

    CanonicalProduct {
        date: ctx.date.to_string(),
        location: ctx.location,
        l1_category: ctx.category.l1_category.clone(),
        l1_category_id: ctx.category.l1_category_id.clone(),
        l2_category: ctx.category.l2_category.clone(),
        l2_category_id: ctx.category.l2_category_id.clone(),
        store_id: p.store_id.clone(),
        variant_id: p.id.clone(),
        variant_name: join_name(&p.name, &p.variant),
        group_id: p.group_id.clone(),
        selling_price,
        mrp,
        in_stock: p.is_in_stock.as_ref().is_some_and(is_truthy),
        inventory: inventory_count(p.inventory.as_ref()),
        is_offer,
        image_url: p.image_url.clone(),
        brand_id: p.brand_id.clone(),
        brand: p.brand.clone(),
    }
}

fn normalize_snippet(
    data: &SnippetData,
    tracking: Option<&SnippetTracking>,
    ctx: &NormalizeContext<'_>,
) -> CanonicalProduct {
    let text = |field: Option<&TextField>| field.map(|f| f.text.clone()).unwrap_or_default();

    let selling_price = strip_currency(&text(data.normal_price.as_ref()));
    let raw_mrp = text(data.mrp.as_ref());
    let mrp = if raw_mrp.is_empty() {
        selling_price.clone()
    } else {
        strip_currency(&raw_mrp)
    };

    let mut l2_category = ctx.category.l2_category.clone();
    let mut l2_category_id = ctx.category.l2_category_id.clone();
    if let Some(attrs) = tracking.and_then(|t| t.common_attributes.as_ref()) {
        if l2_category.is_empty() {
            l2_category.clone_from(&attrs.l2_category);
        }
        if l2_category_id.is_empty() {
            l2_category_id.clone_from(&attrs.l2_category_id);
        }
    }

    CanonicalProduct {
        date: ctx.date.to_string(),
        location: ctx.location,
        l1_category: ctx.category.l1_category.clone(),
        l1_category_id: ctx.category.l1_category_id.clone(),
        l2_category,
        l2_category_id,
        store_id: data.merchant_id.clone(),
        variant_id: data.product_id.clone(),
        variant_name: join_name(&text(data.name.as_ref()), &text(data.variant.as_ref())),
        group_id: data.group_id.clone(),
        is_offer: snippet_offer(data, &mrp, &selling_price),
        selling_price,
        mrp,
        in_stock: !is_truthy(&data.is_sold_out),
        inventory: inventory_count(data.inventory.as_ref()),
        image_url: data.image.as_ref().map(|i| i.url.clone()).unwrap_or_default(),
        brand_id: String::new(),
        brand: text(data.brand_name.as_ref()),
    }
}

/// Offer rule for snippet payloads.
///
/// The last arm fires for a present, non-`false` `offer` that is truthy, or
/// for any such `offer` when the price texts differ. The texts are compared as
/// strings, so `"80"` against `"80.0"` counts as a difference.
fn snippet_offer(data: &SnippetData, mrp: &str, selling_price: &str) -> bool {
    if data.offer_tag.is_some() {
        return true;
    }
    if price_gt(mrp, selling_price) {
        return true;
    }
    match &data.offer {
        None | Some(Value::Bool(false)) => false,
        Some(offer) => is_truthy(offer) || mrp != selling_price,
    }
}

fn join_name(name: &str, variant: &str) -> String {
    format!("{name} {variant}").trim().to_string()
}

/// Removes currency symbols and thousands separators from price text.
#[must_use]
pub fn strip_currency(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '₹' | '$' | '€' | '£' | ','))
        .collect::<String>()
        .trim()
        .to_string()
}

/// `true` when both prices parse and `a > b`.
fn price_gt(a: &str, b: &str) -> bool {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(a), Ok(b)) => a > b,
        _ => false,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn inventory_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
