use serde::{Deserialize, Serialize};

/// A delivery location expressed as WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "latitude")]
    pub lat: f64,
    #[serde(rename = "longitude")]
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.lat, self.lng)
    }
}

/// The two-level category a listing page belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CategoryContext {
    pub l1_category: String,
    pub l1_category_id: String,
    pub l2_category: String,
    pub l2_category_id: String,
}

/// One product listing as observed at one location on one day.
///
/// Prices are kept as the numeric text the storefront returned (currency
/// symbols stripped) so the CSV mirrors upstream formatting exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    /// Scrape date, `YYYY-MM-DD`.
    pub date: String,
    pub location: Option<GeoPoint>,
    pub l1_category: String,
    pub l1_category_id: String,
    pub l2_category: String,
    pub l2_category_id: String,
    pub store_id: String,
    pub variant_id: String,
    /// `name` and `variant` joined by a space and trimmed.
    pub variant_name: String,
    pub group_id: String,
    pub selling_price: String,
    pub mrp: String,
    pub in_stock: bool,
    pub inventory: i64,
    pub is_offer: bool,
    pub image_url: String,
    pub brand_id: String,
    pub brand: String,
}

impl CanonicalProduct {
    /// Flattens the product into its CSV record form.
    #[must_use]
    pub fn to_row(&self) -> ProductRow {
        let (lat, lng) = self
            .location
            .map_or((String::new(), String::new()), |p| {
                (p.lat.to_string(), p.lng.to_string())
            });

        ProductRow {
            date: self.date.clone(),
            lat,
            lng,
            l1_category: self.l1_category.clone(),
            l1_category_id: self.l1_category_id.clone(),
            l2_category: self.l2_category.clone(),
            l2_category_id: self.l2_category_id.clone(),
            store_id: self.store_id.clone(),
            variant_id: self.variant_id.clone(),
            variant_name: self.variant_name.clone(),
            group_id: self.group_id.clone(),
            selling_price: self.selling_price.clone(),
            mrp: self.mrp.clone(),
            in_stock: yes_no(self.in_stock).to_string(),
            inventory: self.inventory.to_string(),
            is_offer: yes_no(self.is_offer).to_string(),
            image_url: self.image_url.clone(),
            brand_id: self.brand_id.clone(),
            brand: self.brand.clone(),
        }
    }
}

/// CSV record for the canonical products file. Field order is the column order.
///
/// Every field is text so that files written by older runs (or edited by
/// hand) can always be read back for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub date: String,
    pub lat: String,
    pub lng: String,
    pub l1_category: String,
    pub l1_category_id: String,
    pub l2_category: String,
    pub l2_category_id: String,
    pub store_id: String,
    pub variant_id: String,
    pub variant_name: String,
    pub group_id: String,
    pub selling_price: String,
    pub mrp: String,
    pub in_stock: String,
    pub inventory: String,
    pub is_offer: String,
    pub image_url: String,
    pub brand_id: String,
    pub brand: String,
}

impl ProductRow {
    #[must_use]
    pub fn is_offer(&self) -> bool {
        self.is_offer == "Yes"
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
