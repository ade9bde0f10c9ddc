use serde_json::Value;
use tracing::debug;

pub fn name(data: &Value) -> String {
    data.get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Image entries in page order, URLs and `ImageObject`s alike. A lone
/// string or object counts as a one-element list.
pub fn images(data: &Value) -> Vec<Value> {
    match data.get("image") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single @ (Value::String(_) | Value::Object(_))) => vec![single.clone()],
        Some(other) => {
            debug!(image = %other, "Ignoring scalar image value");
            Vec::new()
        }
    }
}

/// The dedup key, falling back to the page's own URL when the block has none.
pub fn sku(data: &Value, page_url: &str) -> String {
    match data.get("sku") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => page_url.to_string(),
    }
}

pub fn brand_name(data: &Value) -> String {
    data.get("brand")
        .and_then(|b| b.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
