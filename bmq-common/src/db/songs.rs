//! `songs` table: database-backed catalog

use crate::catalog::Catalog;
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Build a catalog from the `songs` table, URLs in insertion order per style
pub async fn load_catalog(pool: &SqlitePool) -> Result<Catalog> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT style, url FROM songs ORDER BY style, id")
            .fetch_all(pool)
            .await?;

    let mut catalog = Catalog::new();
    for (style, url) in rows {
        catalog.push(style, url);
    }
    Ok(catalog)
}

/// Replace the whole `songs` table with `catalog` in one transaction
///
/// Returns the number of rows written.
pub async fn replace_songs(pool: &SqlitePool, catalog: &Catalog) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM songs").execute(&mut *tx).await?;

    let mut written = 0;
    for song in catalog.flatten() {
        // a URL listed under two styles keeps the first
        let result = sqlx::query("INSERT OR IGNORE INTO songs (url, style) VALUES (?, ?)")
            .bind(&song.url)
            .bind(song.style.as_str())
            .execute(&mut *tx)
            .await?;
        written += result.rows_affected();
    }

    tx.commit().await?;
    info!("Replaced songs table with {} rows", written);
    Ok(written)
}
