//! Typed views over the two listing API payload shapes.
//!
//! Upstream scalars arrive as strings or numbers depending on the endpoint
//! revision, so identifier and price fields are read through
//! [`scalar_text`], which accepts either and renders them as text.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A raw listing payload classified by shape.
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// Top-level `widgets[]`, each optionally carrying `products[]`.
    Widget(WidgetPage),
    /// `response.snippets[]`, each carrying one product under `data`.
    Snippet(SnippetPage),
    /// Anything else, including payloads whose recognized shape failed to parse.
    Unknown,
}

impl RawPayload {
    /// Classifies `value` by probing for the shape's marker keys, then parses
    /// it into the matching typed view.
    #[must_use]
    pub fn probe(value: &Value) -> Self {
        if value.get("widgets").is_some() {
            return match WidgetPage::deserialize(value) {
                Ok(page) => Self::Widget(page),
                Err(e) => {
                    tracing::debug!(error = %e, "widget-shaped payload failed to parse");
                    Self::Unknown
                }
            };
        }
        if value.pointer("/response/snippets").is_some() {
            return match SnippetPage::deserialize(value) {
                Ok(page) => Self::Snippet(page),
                Err(e) => {
                    tracing::debug!(error = %e, "snippet-shaped payload failed to parse");
                    Self::Unknown
                }
            };
        }
        Self::Unknown
    }

    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Widget(_) => "widget",
            Self::Snippet(_) => "snippet",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetPage {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Widget {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub products: Vec<WidgetProduct>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetProduct {
    #[serde(default)]
    pub price: Option<WidgetPrice>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub store_id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub variant: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub group_id: String,
    #[serde(default)]
    pub is_in_stock: Option<Value>,
    #[serde(default)]
    pub inventory: Option<Value>,
    #[serde(default)]
    pub is_offer: Option<Value>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub image_url: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub brand_id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub brand: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetPrice {
    #[serde(default, deserialize_with = "scalar_text")]
    pub selling_price: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub mrp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnippetPage {
    pub response: SnippetResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnippetResponse {
    #[serde(default, deserialize_with = "nullable_vec")]
    pub snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub data: Option<SnippetData>,
    #[serde(default)]
    pub tracking: Option<SnippetTracking>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnippetData {
    #[serde(default)]
    pub name: Option<TextField>,
    #[serde(default)]
    pub variant: Option<TextField>,
    #[serde(default)]
    pub normal_price: Option<TextField>,
    #[serde(default)]
    pub mrp: Option<TextField>,
    #[serde(default)]
    pub brand_name: Option<TextField>,
    #[serde(default)]
    pub image: Option<ImageField>,
    #[serde(default, deserialize_with = "scalar_text")]
    pub merchant_id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub product_id: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub group_id: String,
    /// Missing means sold out; an explicit `null` does not.
    #[serde(default = "sold_out_default")]
    pub is_sold_out: Value,
    #[serde(default)]
    pub inventory: Option<Value>,
    #[serde(default)]
    pub offer_tag: Option<Value>,
    #[serde(default)]
    pub offer: Option<Value>,
    #[serde(default)]
    pub tracking: Option<SnippetTracking>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextField {
    #[serde(default, deserialize_with = "scalar_text")]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageField {
    #[serde(default, deserialize_with = "scalar_text")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnippetTracking {
    #[serde(default)]
    pub common_attributes: Option<CommonAttributes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonAttributes {
    #[serde(default, deserialize_with = "scalar_text")]
    pub l2_category: String,
    #[serde(default, deserialize_with = "scalar_text")]
    pub l2_category_id: String,
}

fn sold_out_default() -> Value {
    Value::Bool(true)
}

/// Reads a string, number or boolean as text. Anything else becomes empty.
fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Truthiness of a loosely typed JSON flag: `null`, `false`, `0`, `""`, `[]`
/// and `{}` are false, everything else is true.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn probe_detects_widget_shape() {
        let value = json!({"widgets": [{"products": [{"id": 1, "name": "Milk"}]}]});
        let RawPayload::Widget(page) = RawPayload::probe(&value) else {
            panic!("expected widget shape");
        };
        assert_eq!(page.widgets[0].products[0].id, "1");
    }

    #[test]
    fn probe_detects_snippet_shape() {
        let value = json!({"response": {"snippets": [{"data": {"product_id": "77"}}]}});
        let RawPayload::Snippet(page) = RawPayload::probe(&value) else {
            panic!("expected snippet shape");
        };
        let data = page.response.snippets[0].data.as_ref().unwrap();
        assert_eq!(data.product_id, "77");
    }

    #[test]
    fn widget_marker_wins_when_both_present() {
        let value = json!({"widgets": [], "response": {"snippets": []}});
        assert_eq!(RawPayload::probe(&value).shape(), "widget");
    }

    #[test]
    fn unrecognized_shapes_are_unknown() {
        assert_eq!(RawPayload::probe(&json!({"foo": 1})).shape(), "unknown");
        assert_eq!(RawPayload::probe(&json!([1, 2])).shape(), "unknown");
        assert_eq!(RawPayload::probe(&json!("text")).shape(), "unknown");
    }

    #[test]
    fn malformed_recognized_shape_is_unknown() {
        let value = json!({"widgets": "not-a-list"});
        assert_eq!(RawPayload::probe(&value).shape(), "unknown");
    }

    #[test]
    fn null_lists_read_as_empty() {
        let value = json!({"widgets": [{"products": null}], "x": 1});
        let RawPayload::Widget(page) = RawPayload::probe(&value) else {
            panic!("expected widget shape");
        };
        assert!(page.widgets[0].products.is_empty());
    }

    #[test]
    fn scalar_text_accepts_numbers_and_strings() {
        let value = json!({"widgets": [{"products": [{
            "id": 391306,
            "store_id": "30961",
            "price": {"selling_price": 52.5, "mrp": "55"}
        }]}]});
        let RawPayload::Widget(page) = RawPayload::probe(&value) else {
            panic!("expected widget shape");
        };
        let product = &page.widgets[0].products[0];
        assert_eq!(product.id, "391306");
        assert_eq!(product.store_id, "30961");
        let price = product.price.as_ref().unwrap();
        assert_eq!(price.selling_price, "52.5");
        assert_eq!(price.mrp, "55");
    }

    #[test]
    fn sold_out_defaults_to_true_only_when_missing() {
        let missing: SnippetData = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.is_sold_out, Value::Bool(true));

        let null: SnippetData = serde_json::from_value(json!({"is_sold_out": null})).unwrap();
        assert_eq!(null.is_sold_out, Value::Null);
    }

    #[test]
    fn truthiness_follows_loose_flag_rules() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("10% OFF")));
        assert!(is_truthy(&json!({"text": "x"})));
    }
}
