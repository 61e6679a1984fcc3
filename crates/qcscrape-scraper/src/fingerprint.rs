//! Identity keys for raw listing pages and canonical products.

use std::fmt;

use qcscrape_core::CanonicalProduct;
use serde_json::Value;
use sha2::{Digest, Sha256};

const NEXT_URL_PATHS: [&str; 2] = ["/pagination/next_url", "/response/pagination/next_url"];
const SHOWN_COUNT_PATHS: [&str; 2] = [
    "/postback_params/shown_product_count",
    "/response/postback_params/shown_product_count",
];
const LE_META_ID_PATHS: [&str; 2] = ["/tracking/le_meta/id", "/response/tracking/le_meta/id"];

/// Identity of one raw listing page within a capture session.
///
/// Variants are listed in priority order; [`ResponseKey::of`] returns the
/// first one the payload can supply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseKey {
    NextUrl(String),
    ShownCount(String),
    LeMetaId(String),
    /// Hex SHA-256 of the serialized payload.
    ContentHash(String),
}

impl ResponseKey {
    /// Derives the key for `payload`. Never fails.
    #[must_use]
    pub fn of(payload: &Value) -> Self {
        if let Some(url) = first_scalar(payload, &NEXT_URL_PATHS) {
            return Self::NextUrl(url);
        }
        if let Some(count) = first_scalar(payload, &SHOWN_COUNT_PATHS) {
            return Self::ShownCount(count);
        }
        if let Some(id) = first_scalar(payload, &LE_META_ID_PATHS) {
            return Self::LeMetaId(id);
        }
        Self::ContentHash(sha256_hex(payload.to_string().as_bytes()))
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NextUrl(v) => write!(f, "next_url:{v}"),
            Self::ShownCount(v) => write!(f, "shown_count:{v}"),
            Self::LeMetaId(v) => write!(f, "le_meta:{v}"),
            Self::ContentHash(v) => write!(f, "hash:{v}"),
        }
    }
}

/// Returns the `pagination.next_url` of a payload, if it carries one.
pub(crate) fn next_url(payload: &Value) -> Option<String> {
    first_scalar(payload, &NEXT_URL_PATHS)
}

/// Content fingerprint of a canonical product.
///
/// Two products with equal fingerprints are the same catalog entry. Fields are
/// separated by NUL so adjacent values cannot run together.
#[must_use]
pub fn product_fingerprint(product: &CanonicalProduct) -> String {
    let fields = [
        product.l1_category.as_str(),
        product.l2_category.as_str(),
        product.variant_id.as_str(),
        product.variant_name.as_str(),
        product.group_id.as_str(),
        product.selling_price.as_str(),
        product.mrp.as_str(),
        product.brand.as_str(),
    ];
    sha256_hex(fields.join("\0").as_bytes())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// First non-empty string or number found at any of `paths`.
fn first_scalar(payload: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|p| match payload.pointer(p)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
