mod config;
mod crawl;
mod db;
mod fetch;
mod listing;
mod parser;
mod record;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::CrawlConfig;
use crate::fetch::HttpFetcher;

#[derive(Parser)]
#[command(name = "nike_scraper", about = "Nike product scraper: JSON-LD to SQLite")]
struct Cli {
    /// Config file (default: nike_scraper.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database path, overrides the config value
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing page and API pages, storing every product found
    Crawl {
        /// Number of API pages to walk
        #[arg(short = 'p', long)]
        max_pages: Option<usize>,
    },
    /// Extract products from saved detail pages and print them as JSON
    Parse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Page URL used for the sku fallback (default: the file path)
        #[arg(long)]
        url: Option<String>,
    },
    /// Show store statistics
    Stats,
    /// Print one stored product as JSON
    Show { sku: String },
    /// Stored products table
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut cfg = CrawlConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }

    let result = match cli.command {
        Commands::Crawl { max_pages } => {
            if let Some(n) = max_pages {
                cfg.max_pages = n;
            }
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let fetcher = Arc::new(HttpFetcher::new(&cfg.user_agent)?);

            println!(
                "Crawling {} (+{} API pages of {})...",
                cfg.base_url, cfg.max_pages, cfg.items_per_page
            );
            let stats = crawl::crawl(&conn, fetcher, &cfg).await?;
            db::close(conn)?;

            println!(
                "Done: {} requested ({} new, {} duplicate, {} skipped, {} errors, {} filtered).",
                stats.requested,
                stats.inserted,
                stats.duplicates,
                stats.skipped,
                stats.fetch_errors,
                stats.filtered
            );
            if stats.listing_errors > 0 {
                println!("{} listing/API pages failed.", stats.listing_errors);
            }
            Ok(())
        }
        Commands::Parse { files, url } => {
            use rayon::prelude::*;

            let results: Vec<_> = files
                .par_iter()
                .map(|path| {
                    let page_url = url.clone().unwrap_or_else(|| path.display().to_string());
                    let html = std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read {:?}", path))?;
                    parser::process_page(&html, &page_url)
                        .with_context(|| format!("No product in {:?}", path))
                })
                .collect();

            let mut parsed = 0usize;
            for result in results {
                match result {
                    Ok(record) => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                        parsed += 1;
                    }
                    Err(e) => warn!("{:#}", e),
                }
            }
            println!("Parsed {} of {} files.", parsed, files.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Products:  {}", s.products);
            println!("SKUs:      {}", s.distinct_skus);
            println!("In stock:  {}", s.in_stock);
            db::close(conn)
        }
        Commands::Show { sku } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let found = db::find_by_sku(&conn, &sku)?;
            db::close(conn)?;
            match found {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No product with sku {}", sku),
            }
            Ok(())
        }
        Commands::List { limit } => {
            let conn = db::connect(&cfg.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_products(&conn, limit)?;
            db::close(conn)?;
            if rows.is_empty() {
                println!("No products stored. Run 'crawl' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<34} | {:<16} | {:<14} | {:>8} | {:>8} | {:<8} | {:>5}",
                "#", "Name", "SKU", "Colour", "Low", "High", "Stock", "Stars"
            );
            println!("{}", "-".repeat(118));

            for (i, r) in rows.iter().enumerate() {
                let price = |n: &Option<record::Numeric>| {
                    n.as_ref()
                        .and_then(|n| n.as_f64())
                        .map(|p| format!("{:.2}", p))
                        .unwrap_or_else(|| "-".into())
                };
                let stars = r
                    .rating_value
                    .as_ref()
                    .and_then(|n| n.as_f64())
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "-".into());

                println!(
                    "{:>3} | {:<34} | {:<16} | {:<14} | {:>8} | {:>8} | {:<8} | {:>5}",
                    i + 1,
                    truncate(r.name.as_deref().unwrap_or(""), 34),
                    truncate(&r.sku, 16),
                    truncate(r.colour.as_deref().unwrap_or("-"), 14),
                    price(&r.low_price),
                    price(&r.high_price),
                    truncate(r.availability.as_deref().unwrap_or(""), 8),
                    stars
                );
            }

            println!("\n{} products", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
