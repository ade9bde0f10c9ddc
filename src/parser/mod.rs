pub mod extract;
pub mod jsonld;
pub mod normalize;

use thiserror::Error;

use crate::record::ProductRecord;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no application/ld+json block on page")]
    MissingLinkedData,
    #[error("malformed linked data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("linked data is not a JSON object")]
    NotAnObject,
}

/// Detail page → linked data → raw record → normalized record.
pub fn process_page(html: &str, url: &str) -> Result<ProductRecord, ExtractError> {
    let data = jsonld::product_block(html)?;
    let mut record = extract::extract_product(&data, url);
    normalize::normalize(&mut record);
    Ok(record)
}
