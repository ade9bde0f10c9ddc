use serde_json::Value;

use crate::record::Numeric;

pub struct Rating {
    pub rating_value: Option<Numeric>,
    pub review_count: Option<Numeric>,
    pub best_rating: Option<Numeric>,
    pub worst_rating: Option<Numeric>,
}

/// Read `aggregateRating`, each figure independently numeric-or-null.
pub fn extract(data: &Value) -> Rating {
    let rating = data.get("aggregateRating");
    let field = |key: &str| {
        rating
            .and_then(|r| r.get(key))
            .and_then(Numeric::from_json)
            .and_then(Numeric::coerce)
    };

    Rating {
        rating_value: field("ratingValue"),
        review_count: field("reviewCount"),
        best_rating: field("bestRating"),
        worst_rating: field("worstRating"),
    }
}
