use serde_json::Value;

use crate::record::Numeric;

const AGGREGATE_OFFER: &str = "AggregateOffer";

/// Pricing read from an `AggregateOffer`.
#[derive(Debug, PartialEq)]
pub struct Pricing {
    pub low_price: Option<Numeric>,
    pub high_price: Option<Numeric>,
    pub price_currency: Option<String>,
    pub offer_count: Option<i64>,
    /// `""` when the key is missing, `None` when it is an explicit `null`.
    pub availability: Option<String>,
    /// Only set when `offers` is an `AggregateOffer`.
    pub seller_name: Option<String>,
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing {
            low_price: None,
            high_price: None,
            price_currency: None,
            offer_count: None,
            availability: Some(String::new()),
            seller_name: None,
        }
    }
}

/// Pricing rule. Anything other than an `AggregateOffer` object yields empty
/// pricing with no seller.
pub fn pricing(data: &Value) -> Pricing {
    let Some(offers) = data.get("offers").filter(|o| is_aggregate(o)) else {
        return Pricing::default();
    };

    let seller_name = first_offer(offers)
        .and_then(|o| o.get("seller"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Pricing {
        low_price: offers.get("lowPrice").and_then(Numeric::from_json),
        high_price: offers.get("highPrice").and_then(Numeric::from_json),
        price_currency: offers
            .get("priceCurrency")
            .and_then(Value::as_str)
            .map(str::to_string),
        offer_count: offers.get("offerCount").and_then(offer_count),
        availability: availability(offers.get("availability")),
        seller_name: Some(seller_name),
    }
}

/// Colour rule. Runs for any `offers` object, whatever its type tag.
pub fn colour(data: &Value) -> Option<String> {
    let offers = data.get("offers").filter(|o| o.is_object())?;
    match first_offer(offers)?.get("itemOffered")?.get("color")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

fn is_aggregate(offers: &Value) -> bool {
    offers.is_object() && offers.get("@type").and_then(Value::as_str) == Some(AGGREGATE_OFFER)
}

fn first_offer(offers: &Value) -> Option<&Value> {
    offers.get("offers")?.as_array()?.first()
}

fn availability(value: Option<&Value>) -> Option<String> {
    match value {
        None => Some(String::new()),
        Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn offer_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
