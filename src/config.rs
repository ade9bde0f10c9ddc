use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "NIKE";
const DEFAULT_CONFIG_NAME: &str = "nike_scraper";

/// Static crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Listing page the traversal starts from.
    pub base_url: String,
    /// Product-wall API endpoint, without query string.
    pub api_url: String,
    /// Query parameters sent before `anchor` and `count`.
    pub api_query: String,
    pub items_per_page: usize,
    pub max_pages: usize,
    /// Detail URL = prefix + slug.
    pub product_url_prefix: String,
    pub product_link_selector: String,
    pub allowed_domains: Vec<String>,
    pub db_path: PathBuf,
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.nike.com/w/mens-tops-t-shirts-9om13znik1".into(),
            api_url: "https://api.nike.com//discover/product_wall/v1/marketplace/US/language/en/consumerChannelId/d9a5bc42-4b9c-4976-858a-f159cf99c647".into(),
            api_query: "path=/w/mens-tops-t-shirts-9om13znik1&attributeIds=0f64ecc7-d624-4e91-b171-b83a03dd8550,de314d73-b9c5-4b15-93dd-0bef5257d3b4&queryType=PRODUCTS".into(),
            items_per_page: 24,
            max_pages: 2,
            product_url_prefix: "https://www.nike.com/t/".into(),
            product_link_selector: "a.product-card__link-overlay".into(),
            allowed_domains: vec!["www.nike.com".into(), "api.nike.com".into()],
            db_path: PathBuf::from("nike_products.db"),
            concurrency: 10,
            user_agent: concat!("nike_scraper/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl CrawlConfig {
    /// Defaults, then the config file, then `NIKE_*` environment variables.
    ///
    /// An explicit `path` must exist; the default `nike_scraper.{toml,yaml,json}`
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let cfg: CrawlConfig = Config::builder()
            .add_source(Config::try_from(&CrawlConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_domains"),
            )
            .build()
            .context("Failed to load crawl configuration")?
            .try_deserialize()
            .context("Invalid crawl configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.items_per_page > 0, "items_per_page must be at least 1");
        ensure!(self.concurrency > 0, "concurrency must be at least 1");
        url::Url::parse(&self.base_url)
            .with_context(|| format!("base_url is not a valid URL: {}", self.base_url))?;
        Ok(())
    }
}
