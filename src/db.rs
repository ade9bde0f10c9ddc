use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Row};
use tracing::warn;

use crate::record::{Numeric, ProductRecord, COLUMNS};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS products (
            name          TEXT,
            colour        TEXT,
            images        TEXT,
            sku           TEXT,
            url           TEXT,
            availability  TEXT,
            lowPrice      REAL,
            highPrice     REAL,
            priceCurrency TEXT,
            offerCount    INTEGER,
            brandName     TEXT,
            ratingValue   REAL,
            reviewCount   INTEGER,
            bestRating    REAL,
            worstRating   REAL,
            sellerName    TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_products_sku ON products(sku);
        ",
    )
    .context("Failed to create products table")?;
    Ok(())
}

/// Release the connection, surfacing any error SQLite reports on close.
pub fn close(conn: Connection) -> Result<()> {
    conn.close()
        .map_err(|(_, e)| e)
        .context("Failed to close database")
}

// ── Products ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Insert `record` unless a row with the same sku exists. The check and the
/// insert are one statement, so the existing row is never touched.
pub fn insert_if_absent(conn: &Connection, record: &ProductRecord) -> Result<InsertOutcome> {
    let sql = format!(
        "INSERT OR IGNORE INTO products ({}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        COLUMNS.join(", ")
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let changed = stmt.execute(rusqlite::params![
        record.name,
        record.colour,
        record.images_json()?,
        record.sku,
        record.url,
        record.availability,
        record.low_price,
        record.high_price,
        record.price_currency,
        record.offer_count,
        record.brand_name,
        record.rating_value,
        record.review_count,
        record.best_rating,
        record.worst_rating,
        record.seller_name,
    ])?;

    if changed == 0 {
        warn!(sku = %record.sku, url = %record.url, "Item already in DB");
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::Inserted)
    }
}

pub fn find_by_sku(conn: &Connection, sku: &str) -> Result<Option<ProductRecord>> {
    let sql = format!("SELECT {} FROM products WHERE sku = ?1", COLUMNS.join(", "));
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([sku], product_from_row)?;
    let found = rows.next().transpose()?;
    Ok(found)
}

pub fn fetch_products(conn: &Connection, limit: usize) -> Result<Vec<ProductRecord>> {
    let sql = format!(
        "SELECT {} FROM products ORDER BY rowid LIMIT {}",
        COLUMNS.join(", "),
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], product_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn product_from_row(row: &Row) -> rusqlite::Result<ProductRecord> {
    let numeric = |idx: usize| -> rusqlite::Result<Option<Numeric>> {
        Ok(row.get::<_, Option<f64>>(idx)?.map(Numeric::Parsed))
    };
    let images: Option<String> = row.get(2)?;

    Ok(ProductRecord {
        name: row.get(0)?,
        colour: row.get(1)?,
        images: images.and_then(|s| serde_json::from_str::<Vec<serde_json::Value>>(&s).ok()),
        sku: row.get(3)?,
        url: row.get(4)?,
        availability: row.get(5)?,
        low_price: numeric(6)?,
        high_price: numeric(7)?,
        price_currency: row.get(8)?,
        offer_count: row.get(9)?,
        brand_name: row.get(10)?,
        rating_value: numeric(11)?,
        review_count: numeric(12)?,
        best_rating: numeric(13)?,
        worst_rating: numeric(14)?,
        seller_name: row.get(15)?,
    })
}

// ── Stats ──

pub struct Stats {
    pub products: usize,
    pub distinct_skus: usize,
    pub in_stock: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let products: usize = conn.query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))?;
    let distinct_skus: usize =
        conn.query_row("SELECT COUNT(DISTINCT sku) FROM products", [], |r| r.get(0))?;
    let in_stock: usize = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE availability = 'InStock'",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        products,
        distinct_skus,
        in_stock,
    })
}
