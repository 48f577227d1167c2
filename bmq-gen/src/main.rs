//! Catalog manifest generator (bmq-gen)
//!
//! Walks a local audio directory laid out as `STYLE/FILE` and writes the
//! `music-files.json` manifest the server reads.
//!
//! **Usage:**
//! ```bash
//! bmq-gen --audio-dir ./audio --base-url https://cdn.example.com [--output FILE] [--database DB]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bmq_common::catalog::{scan_audio_dir, ScanReport};
use bmq_common::db::{init_database, songs};
use clap::Parser;
use tracing::{info, warn};

/// Generate music-files.json from an audio directory
#[derive(Parser, Debug)]
#[command(name = "bmq-gen")]
#[command(about = "Generate the Ballroom Music Quiz song manifest from an audio directory")]
#[command(version)]
struct Args {
    /// Audio root; each sub-directory is one dance style
    #[arg(long, value_name = "DIR")]
    audio_dir: PathBuf,

    /// Public URL prefix; songs become {base-url}/audio/{style}/{file}
    #[arg(long, value_name = "URL")]
    base_url: String,

    /// Manifest to write (default: DIR/music-files.json)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also replace the songs table in this database
    #[arg(long, value_name = "DB")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Reading directory: {}", args.audio_dir.display());

    let report = scan_audio_dir(&args.audio_dir, &args.base_url)
        .with_context(|| format!("Failed to scan {}", args.audio_dir.display()))?;
    log_report(&report);

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.audio_dir));
    write_manifest(&report, &output)?;
    info!(
        "music-files.json generated at {} ({} styles, {} songs)",
        output.display(),
        report.catalog.style_count(),
        report.catalog.song_count()
    );

    if let Some(db_path) = args.database {
        let pool = init_database(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let inserted = songs::replace_songs(&pool, &report.catalog)
            .await
            .context("Failed to replace songs table")?;
        pool.close().await;
        info!("Replaced songs table in {}: {} rows", db_path.display(), inserted);
    }

    Ok(())
}

fn default_output(audio_dir: &Path) -> PathBuf {
    audio_dir.join("music-files.json")
}

fn log_report(report: &ScanReport) {
    for path in &report.skipped {
        info!("Skipping {}", path.display());
    }
    for style in &report.empty_styles {
        warn!("No valid audio files found in {}", style);
    }
}

/// Pretty-print the catalog to `path`
fn write_manifest(report: &ScanReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&report.catalog)
        .context("Failed to serialize catalog")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
