//! Catalog sources
//!
//! Every source returns a [`Catalog`] or an error. Callers that must never fail
//! (the music-files endpoint) substitute [`Catalog::fallback`] themselves.

use super::{scan_audio_dir, Catalog};
use crate::config::{CatalogConfig, CatalogSourceKind};
use crate::{db, Error, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the catalog is read from at request time
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// Local `music-files.json`
    Manifest(PathBuf),
    /// Manifest fetched over HTTP
    Remote { url: String, client: reqwest::Client },
    /// Audio directory scanned on each load
    Directory { audio_dir: PathBuf, base_url: String },
    /// `songs` table
    Database(SqlitePool),
}

impl CatalogSource {
    /// Build the configured source
    ///
    /// `pool` is only used by the database source.
    pub fn from_config(config: &CatalogConfig, pool: &SqlitePool) -> Result<Self> {
        match config.source {
            CatalogSourceKind::Manifest => Ok(CatalogSource::Manifest(config.manifest_path.clone())),
            CatalogSourceKind::Remote => {
                let url = config
                    .remote_url
                    .clone()
                    .ok_or_else(|| Error::Config("catalog.remote_url is not set".to_string()))?;
                let client = reqwest::Client::builder()
                    .timeout(REMOTE_TIMEOUT)
                    .build()?;
                Ok(CatalogSource::Remote { url, client })
            }
            CatalogSourceKind::Directory => {
                let audio_dir = config
                    .audio_dir
                    .clone()
                    .ok_or_else(|| Error::Config("catalog.audio_dir is not set".to_string()))?;
                Ok(CatalogSource::Directory {
                    audio_dir,
                    base_url: config.base_url.clone(),
                })
            }
            CatalogSourceKind::Database => Ok(CatalogSource::Database(pool.clone())),
        }
    }

    /// Read the current catalog
    pub async fn load(&self) -> Result<Catalog> {
        let catalog = match self {
            CatalogSource::Manifest(path) => {
                let bytes = tokio::fs::read(path).await?;
                serde_json::from_slice::<Catalog>(&bytes)?
            }
            CatalogSource::Remote { url, client } => {
                client
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Catalog>()
                    .await?
            }
            CatalogSource::Directory { audio_dir, base_url } => {
                let audio_dir = audio_dir.clone();
                let base_url = base_url.clone();
                tokio::task::spawn_blocking(move || scan_audio_dir(&audio_dir, &base_url))
                    .await
                    .map_err(|e| Error::Internal(format!("directory scan task failed: {}", e)))??
                    .catalog
            }
            CatalogSource::Database(pool) => db::songs::load_catalog(pool).await?,
        };

        debug!(
            "Loaded catalog from {}: {} styles, {} songs",
            self.describe(),
            catalog.style_count(),
            catalog.song_count()
        );
        Ok(catalog)
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            CatalogSource::Manifest(path) => format!("manifest {}", path.display()),
            CatalogSource::Remote { url, .. } => format!("remote {}", url),
            CatalogSource::Directory { audio_dir, .. } => {
                format!("directory {}", audio_dir.display())
            }
            CatalogSource::Database(_) => "songs table".to_string(),
        }
    }
}
