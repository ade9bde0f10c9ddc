use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::CrawlConfig;

pub fn link_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid product link selector {:?}: {:?}", css, e))
}

/// Product-card links on a listing page, resolved against the page URL.
/// Order is preserved and duplicates are kept.
pub fn product_links(html: &str, page_url: &str, selector: &Selector) -> Result<Vec<String>> {
    let base = Url::parse(page_url).with_context(|| format!("Bad listing URL: {}", page_url))?;
    let document = Html::parse_document(html);

    let links = document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| match base.join(href) {
            Ok(u) => Some(u.to_string()),
            Err(e) => {
                debug!(href, error = %e, "Skipping unresolvable link");
                None
            }
        })
        .collect();
    Ok(links)
}

/// One product-wall API URL per page, `max_pages` pages of `items_per_page`.
pub fn api_page_urls(cfg: &CrawlConfig) -> Vec<String> {
    (0..cfg.max_pages)
        .map(|page| {
            let anchor = page * cfg.items_per_page;
            format!(
                "{}?{}&anchor={}&count={}",
                cfg.api_url, cfg.api_query, anchor, cfg.items_per_page
            )
        })
        .collect()
}

/// Detail URLs for the slugs under `data.products.objects` in an API response.
pub fn product_urls_from_api(body: &str, prefix: &str) -> Result<Vec<String>> {
    let data: Value = serde_json::from_str(body).context("API response is not JSON")?;
    let objects = data
        .pointer("/data/products/objects")
        .and_then(Value::as_array);

    Ok(objects
        .into_iter()
        .flatten()
        .filter_map(|o| o.get("slug").and_then(Value::as_str))
        .map(|slug| format!("{}{}", prefix, slug))
        .collect())
}
