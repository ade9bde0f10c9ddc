use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Serialize;
use serde_json::Value;

/// Storage column order for the `products` table.
pub const COLUMNS: [&str; 16] = [
    "name",
    "colour",
    "images",
    "sku",
    "url",
    "availability",
    "lowPrice",
    "highPrice",
    "priceCurrency",
    "offerCount",
    "brandName",
    "ratingValue",
    "reviewCount",
    "bestRating",
    "worstRating",
    "sellerName",
];

pub const IN_STOCK_URI: &str = "https://schema.org/InStock";
pub const IN_STOCK: &str = "InStock";

/// A decimal field as it moves through the pipeline: raw text straight from
/// the page, or a value that has already been coerced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Numeric {
    Parsed(f64),
    Unparsed(String),
}

impl Numeric {
    /// Wrap a JSON value without interpreting text. `null` is treated as absent
    /// and booleans count as 1 or 0.
    pub fn from_json(value: &Value) -> Option<Numeric> {
        match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64().map(Numeric::Parsed),
            Value::Bool(b) => Some(Numeric::Parsed(if *b { 1.0 } else { 0.0 })),
            Value::String(s) => Some(Numeric::Unparsed(s.clone())),
            other => Some(Numeric::Unparsed(other.to_string())),
        }
    }

    /// Coerce to a finite decimal, or `None` if the value isn't one.
    pub fn coerce(self) -> Option<Numeric> {
        match self {
            Numeric::Parsed(f) if f.is_finite() => Some(Numeric::Parsed(f)),
            Numeric::Parsed(_) => None,
            Numeric::Unparsed(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Numeric::Parsed),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Parsed(f) => Some(*f),
            Numeric::Unparsed(_) => None,
        }
    }
}

impl ToSql for Numeric {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Numeric::Parsed(f) => f.to_sql(),
            Numeric::Unparsed(s) => s.to_sql(),
        }
    }
}

/// One scraped product. `None` on any field is persisted as NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: Option<String>,
    pub colour: Option<String>,
    pub images: Option<Vec<Value>>,
    pub sku: String,
    pub url: String,
    pub availability: Option<String>,
    pub low_price: Option<Numeric>,
    pub high_price: Option<Numeric>,
    pub price_currency: Option<String>,
    pub offer_count: Option<i64>,
    pub brand_name: Option<String>,
    pub rating_value: Option<Numeric>,
    pub review_count: Option<Numeric>,
    pub best_rating: Option<Numeric>,
    pub worst_rating: Option<Numeric>,
    pub seller_name: Option<String>,
}

impl ProductRecord {
    /// `images` as the JSON array text stored in the `images` column.
    pub fn images_json(&self) -> serde_json::Result<Option<String>> {
        self.images.as_ref().map(serde_json::to_string).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_from_json() {
        assert_eq!(Numeric::from_json(&json!(19.99)), Some(Numeric::Parsed(19.99)));
        assert_eq!(Numeric::from_json(&json!("4.5")), Some(Numeric::Unparsed("4.5".into())));
        assert_eq!(Numeric::from_json(&Value::Null), None);
        assert_eq!(Numeric::from_json(&json!(true)), Some(Numeric::Parsed(1.0)));
        assert_eq!(Numeric::from_json(&json!(false)), Some(Numeric::Parsed(0.0)));
        assert_eq!(Numeric::from_json(&json!({ "v": 1 })), Some(Numeric::Unparsed(r#"{"v":1}"#.into())));
    }

    #[test]
    fn coerce_parses_trimmed_text() {
        assert_eq!(Numeric::Unparsed(" 29.99 ".into()).coerce(), Some(Numeric::Parsed(29.99)));
        assert_eq!(Numeric::Unparsed("3".into()).coerce(), Some(Numeric::Parsed(3.0)));
    }

    #[test]
    fn coerce_rejects_garbage_and_non_finite() {
        assert_eq!(Numeric::Unparsed("not-a-number".into()).coerce(), None);
        assert_eq!(Numeric::Unparsed("".into()).coerce(), None);
        assert_eq!(Numeric::Unparsed("NaN".into()).coerce(), None);
        assert_eq!(Numeric::Unparsed("inf".into()).coerce(), None);
        assert_eq!(Numeric::Parsed(f64::INFINITY).coerce(), None);
    }

    #[test]
    fn images_serialize_in_order() {
        let record = ProductRecord {
            images: Some(vec![
                json!({ "@type": "ImageObject", "url": "https://a/1.png" }),
                json!("https://a/2.png"),
            ]),
            ..Default::default()
        };
        assert_eq!(
            record.images_json().unwrap().as_deref(),
            Some(r#"[{"@type":"ImageObject","url":"https://a/1.png"},"https://a/2.png"]"#)
        );
        assert_eq!(ProductRecord::default().images_json().unwrap(), None);
    }

    #[test]
    fn serializes_with_column_names() {
        let record = ProductRecord {
            sku: "A1".into(),
            low_price: Some(Numeric::Parsed(19.99)),
            ..Default::default()
        };
        let v = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = v.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        for col in COLUMNS {
            assert!(keys.contains(&col), "missing key {}", col);
        }
        assert_eq!(v["lowPrice"], json!(19.99));
    }
}
