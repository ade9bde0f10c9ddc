pub mod offers;
pub mod product;
pub mod rating;

use serde_json::Value;

use crate::record::ProductRecord;

/// Map a parsed linked-data block onto a raw (un-normalized) record.
pub fn extract_product(data: &Value, page_url: &str) -> ProductRecord {
    let rating = rating::extract(data);
    let pricing = offers::pricing(data);

    ProductRecord {
        name: Some(product::name(data)),
        colour: offers::colour(data),
        images: Some(product::images(data)),
        sku: product::sku(data, page_url),
        url: page_url.to_string(),
        availability: pricing.availability,
        low_price: pricing.low_price,
        high_price: pricing.high_price,
        price_currency: pricing.price_currency,
        offer_count: pricing.offer_count,
        brand_name: Some(product::brand_name(data)),
        rating_value: rating.rating_value,
        review_count: rating.review_count,
        best_rating: rating.best_rating,
        worst_rating: rating.worst_rating,
        seller_name: pricing.seller_name,
    }
}

// ── Tests ──
