use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use scraper::Selector;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::CrawlConfig;
use crate::db::{self, InsertOutcome};
use crate::fetch::{Fetch, OffsiteFilter};
use crate::listing;
use crate::parser::{self, ExtractError};
use crate::record::ProductRecord;

/// Crawl stats returned after completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    /// Detail pages requested (duplicates across sources included).
    pub requested: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Detail pages without usable linked data.
    pub skipped: usize,
    pub fetch_errors: usize,
    /// Listing or API pages that failed to fetch or parse.
    pub listing_errors: usize,
    /// Requests refused by the allowed-domain list.
    pub filtered: usize,
}

enum PageOutcome {
    Parsed(ProductRecord),
    Malformed { url: String, error: ExtractError },
    FetchFailed { url: String, error: anyhow::Error },
}

/// Discover detail pages, fetch them concurrently, and save each product as it
/// arrives. All inserts go through this loop's single connection.
pub async fn crawl<F>(conn: &Connection, fetcher: Arc<F>, cfg: &CrawlConfig) -> Result<CrawlStats>
where
    F: Fetch + 'static,
{
    cfg.validate()?;
    let selector = listing::link_selector(&cfg.product_link_selector)?;
    let offsite = OffsiteFilter::new(&cfg.allowed_domains);
    let mut stats = CrawlStats::default();

    let candidates = discover(&fetcher, cfg, &selector, &offsite, &mut stats).await;
    info!("Discovered {} product URLs", candidates.len());

    let semaphore = Arc::new(Semaphore::new(cfg.concurrency));
    // Channel: workers send outcomes, this loop writes to DB
    let (tx, mut rx) = mpsc::channel::<PageOutcome>(cfg.concurrency * 2);

    for url in candidates {
        if !offsite.allows(&url) {
            debug!("Filtered offsite request to {}", url);
            stats.filtered += 1;
            continue;
        }
        stats.requested += 1;

        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let outcome = match fetcher.get(&url).await {
                Ok(page) => match parser::process_page(&page.body, &page.url) {
                    Ok(record) => PageOutcome::Parsed(record),
                    Err(error) => PageOutcome::Malformed {
                        url: page.url,
                        error,
                    },
                },
                Err(error) => PageOutcome::FetchFailed { url, error },
            };
            let _ = tx.send(outcome).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let pb = ProgressBar::new(stats.requested as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    while let Some(outcome) = rx.recv().await {
        match outcome {
            PageOutcome::Parsed(record) => match db::insert_if_absent(conn, &record)? {
                InsertOutcome::Inserted => {
                    debug!("Saved {} ({})", record.sku, record.url);
                    stats.inserted += 1;
                }
                InsertOutcome::Duplicate => stats.duplicates += 1,
            },
            PageOutcome::Malformed { url, error } => {
                warn!("Skipping {}: {}", url, error);
                stats.skipped += 1;
            }
            PageOutcome::FetchFailed { url, error } => {
                warn!("Fetch failed for {}: {:#}", url, error);
                stats.fetch_errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Crawled {} pages ({} new, {} duplicate, {} skipped, {} errors)",
        stats.requested, stats.inserted, stats.duplicates, stats.skipped, stats.fetch_errors
    );

    Ok(stats)
}

/// Listing-page links followed by every API page's slugs. Order across API
/// pages is arrival order; duplicates are kept.
async fn discover<F>(
    fetcher: &Arc<F>,
    cfg: &CrawlConfig,
    selector: &Selector,
    offsite: &OffsiteFilter,
    stats: &mut CrawlStats,
) -> Vec<String>
where
    F: Fetch + 'static,
{
    let mut urls = Vec::new();

    if offsite.allows(&cfg.base_url) {
        let links = match fetcher.get(&cfg.base_url).await {
            Ok(page) => listing::product_links(&page.body, &page.url, selector),
            Err(e) => Err(e),
        };
        match links {
            Ok(links) => {
                info!("Listing page: {} product links", links.len());
                urls.extend(links);
            }
            Err(e) => {
                warn!("Listing page {} failed: {:#}", cfg.base_url, e);
                stats.listing_errors += 1;
            }
        }
    } else {
        debug!("Filtered offsite listing page {}", cfg.base_url);
        stats.filtered += 1;
    }

    let mut api_pages = JoinSet::new();
    for api_url in listing::api_page_urls(cfg) {
        if !offsite.allows(&api_url) {
            debug!("Filtered offsite API page {}", api_url);
            stats.filtered += 1;
            continue;
        }
        let fetcher = Arc::clone(fetcher);
        let prefix = cfg.product_url_prefix.clone();
        api_pages.spawn(async move {
            let page = fetcher.get(&api_url).await?;
            listing::product_urls_from_api(&page.body, &prefix)
                .with_context(|| format!("Bad API page {}", api_url))
        });
    }

    while let Some(joined) = api_pages.join_next().await {
        match joined {
            Ok(Ok(found)) => {
                debug!("API page: {} product slugs", found.len());
                urls.extend(found);
            }
            Ok(Err(e)) => {
                warn!("API page failed: {:#}", e);
                stats.listing_errors += 1;
            }
            Err(e) => {
                warn!("API task failed: {}", e);
                stats.listing_errors += 1;
            }
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::fetch::FetchedPage;
    use crate::record::Numeric;

    const LISTING: &str = "https://www.nike.com/w/mens-tops";
    const API_PAGE_0: &str = "https://api.nike.com/wall?path=/w/mens-tops&anchor=0&count=2";
    const API_PAGE_1: &str = "https://api.nike.com/wall?path=/w/mens-tops&anchor=2&count=2";

    /// Serves canned bodies; anything else is a 404.
    #[derive(Default)]
    struct StaticFetcher {
        pages: HashMap<String, String>,
        hits: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn hits(&self, url: &str) -> usize {
            self.hits.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl Fetch for StaticFetcher {
        async fn get(&self, url: &str) -> Result<FetchedPage> {
            self.hits.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(FetchedPage {
                    url: url.to_string(),
                    body: body.clone(),
                }),
                None => Err(anyhow!("404 Not Found: {}", url)),
            }
        }
    }

    fn product_page(json: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">{}</script></head></html>"#,
            json
        )
    }

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            base_url: LISTING.into(),
            api_url: "https://api.nike.com/wall".into(),
            api_query: "path=/w/mens-tops".into(),
            items_per_page: 2,
            max_pages: 2,
            product_url_prefix: "https://www.nike.com/t/".into(),
            concurrency: 3,
            ..Default::default()
        }
    }

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn nike_fetcher() -> StaticFetcher {
        let listing = std::fs::read_to_string("tests/fixtures/listing.html").unwrap();
        StaticFetcher::default()
            .with(LISTING, &listing)
            .with(
                API_PAGE_0,
                r#"{"data":{"products":{"objects":[{"slug":"shirt-b"},{"slug":"shirt-c"}]}}}"#,
            )
            .with(API_PAGE_1, "<html>maintenance</html>")
            .with(
                "https://www.nike.com/t/shirt-a",
                &product_page(
                    r#"{"@type":"Product","name":"Shirt A","sku":"A1","offers":{"@type":"AggregateOffer",
                    "lowPrice":"19.99","availability":"https://schema.org/InStock","offers":[{"seller":{"name":"Nike"}}]}}"#,
                ),
            )
            .with(
                "https://www.nike.com/t/shirt-b",
                &product_page(r#"{"@type":"Product","name":"Shirt B","sku":"B1"}"#),
            )
            .with("https://www.nike.com/t/shirt-c", "<html><body>Gone</body></html>")
    }

    #[tokio::test]
    async fn full_traversal() {
        let conn = memory();
        let fetcher = Arc::new(nike_fetcher());
        let stats = crawl(&conn, Arc::clone(&fetcher), &test_config()).await.unwrap();

        assert_eq!(
            stats,
            CrawlStats {
                requested: 4,
                inserted: 2,
                duplicates: 1,
                skipped: 1,
                fetch_errors: 0,
                listing_errors: 1,
                filtered: 1,
            }
        );
        // Same product from both sources is fetched twice but stored once.
        assert_eq!(fetcher.hits("https://www.nike.com/t/shirt-b"), 2);
        assert_eq!(fetcher.hits("https://offsite.example/t/shirt-x"), 0);
        assert_eq!(db::get_stats(&conn).unwrap().products, 2);

        let a = db::find_by_sku(&conn, "A1").unwrap().unwrap();
        assert_eq!(a.url, "https://www.nike.com/t/shirt-a");
        assert_eq!(a.low_price, Some(Numeric::Parsed(19.99)));
        assert_eq!(a.availability.as_deref(), Some("InStock"));
        assert_eq!(a.seller_name.as_deref(), Some("Nike"));
    }

    #[tokio::test]
    async fn fetch_failures_do_not_abort() {
        let conn = memory();
        let fetcher = Arc::new(StaticFetcher::default().with(
            API_PAGE_0,
            r#"{"data":{"products":{"objects":[{"slug":"missing"}]}}}"#,
        ));
        let cfg = CrawlConfig {
            max_pages: 1,
            ..test_config()
        };
        let stats = crawl(&conn, fetcher, &cfg).await.unwrap();
        assert_eq!(stats.listing_errors, 1);
        assert_eq!(stats.requested, 1);
        assert_eq!(stats.fetch_errors, 1);
        assert_eq!(stats.inserted, 0);
    }

    #[tokio::test]
    async fn sku_fallback_per_page() {
        let conn = memory();
        let no_sku = product_page(r#"{"@type":"Product","name":"Mystery"}"#);
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with(
                    API_PAGE_0,
                    r#"{"data":{"products":{"objects":[{"slug":"one"},{"slug":"two"}]}}}"#,
                )
                .with("https://www.nike.com/t/one", &no_sku)
                .with("https://www.nike.com/t/two", &no_sku),
        );
        let cfg = CrawlConfig {
            max_pages: 1,
            ..test_config()
        };
        let stats = crawl(&conn, fetcher, &cfg).await.unwrap();
        assert_eq!(stats.inserted, 2);
        for url in ["https://www.nike.com/t/one", "https://www.nike.com/t/two"] {
            let r = db::find_by_sku(&conn, url).unwrap().unwrap();
            assert_eq!(r.url, url);
        }
    }

    #[tokio::test]
    async fn invalid_selector_fails_before_fetching() {
        let conn = memory();
        let fetcher = Arc::new(StaticFetcher::default());
        let cfg = CrawlConfig {
            product_link_selector: "a[[".into(),
            ..test_config()
        };
        assert!(crawl(&conn, Arc::clone(&fetcher), &cfg).await.is_err());
        assert!(fetcher.hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let conn = memory();
        let fetcher = Arc::new(nike_fetcher());
        let cfg = CrawlConfig {
            concurrency: 0,
            ..test_config()
        };
        assert!(crawl(&conn, Arc::clone(&fetcher), &cfg).await.is_err());
        assert!(fetcher.hits.lock().unwrap().is_empty());
    }
}
