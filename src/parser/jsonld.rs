use scraper::{Html, Selector};
use serde_json::Value;

use super::ExtractError;

const LD_JSON_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

/// Locate the product's linked-data block in a detail page.
///
/// A block typed `Product` wins; otherwise the first block that parses as a
/// JSON object is used.
pub fn product_block(html: &str) -> Result<Value, ExtractError> {
    let scripts = ld_json_scripts(html);
    if scripts.is_empty() {
        return Err(ExtractError::MissingLinkedData);
    }

    let mut first_object = None;
    let mut first_error = None;
    for text in &scripts {
        match serde_json::from_str::<Value>(text) {
            Ok(value) if is_product(&value) => return Ok(value),
            Ok(value) if value.is_object() => {
                first_object.get_or_insert(value);
            }
            Ok(_) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match (first_object, first_error) {
        (Some(value), _) => Ok(value),
        (None, Some(e)) => Err(ExtractError::Malformed(e)),
        (None, None) => Err(ExtractError::NotAnObject),
    }
}

fn ld_json_scripts(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(LD_JSON_SELECTOR) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .filter(|t| !t.trim().is_empty())
        .collect()
}

fn is_product(value: &Value) -> bool {
    value.get("@type").and_then(Value::as_str) == Some("Product")
}
