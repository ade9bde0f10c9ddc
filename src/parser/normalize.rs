use crate::record::{ProductRecord, IN_STOCK, IN_STOCK_URI};

/// Coerce extracted values into canonical form. Never fails; running it twice
/// is the same as running it once.
pub fn normalize(record: &mut ProductRecord) {
    if record.availability.as_deref() == Some(IN_STOCK_URI) {
        record.availability = Some(IN_STOCK.to_string());
    }

    for field in [
        &mut record.low_price,
        &mut record.high_price,
        &mut record.rating_value,
        &mut record.review_count,
        &mut record.best_rating,
        &mut record.worst_rating,
    ] {
        *field = field.take().and_then(|n| n.coerce());
    }
}
