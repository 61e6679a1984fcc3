use std::collections::HashSet;

use qcscrape_core::CanonicalProduct;

use crate::fingerprint::product_fingerprint;

/// Append-only set of product fingerprints.
///
/// Whoever owns the store decides its scope: one per capture run, or one
/// shared by a whole sweep.
#[derive(Debug, Default)]
pub struct DedupStore {
    seen: HashSet<String>,
}

impl DedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `product`, returning `true` if it was not already present.
    pub fn insert(&mut self, product: &CanonicalProduct) -> bool {
        self.seen.insert(product_fingerprint(product))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Keeps only the products not seen before, in their original order.
    pub fn retain_new(&mut self, products: Vec<CanonicalProduct>) -> Vec<CanonicalProduct> {
        products.into_iter().filter(|p| self.insert(p)).collect()
    }
}
