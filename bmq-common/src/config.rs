//! Configuration loading and config file resolution
//!
//! Configuration file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `BMQ_CONFIG` environment variable
//! 3. Platform config directory (`<config dir>/bmq/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file found through steps 2-3 is not an error: a warning is
//! logged and compiled defaults are used. A file named explicitly on the command
//! line must exist.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BMQ_CONFIG";

/// Style keys served when the catalog source is unavailable
pub const DEFAULT_FALLBACK_STYLES: [&str; 10] = [
    "waltz",
    "foxtrot",
    "tango",
    "quickstep",
    "viennese-waltz",
    "cha-cha",
    "rumba",
    "samba",
    "jive",
    "paso-doble",
];

/// Complete service configuration, injected into the server at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    pub game: GameConfig,
    pub leaderboard: LeaderboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("bmq.db"),
        }
    }
}

/// Where the song catalog is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSourceKind {
    /// Local JSON manifest produced by bmq-gen
    Manifest,
    /// JSON manifest fetched over HTTP
    Remote,
    /// Audio directory scanned on every request
    Directory,
    /// `songs` table in the quiz database
    Database,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub source: CatalogSourceKind,
    pub manifest_path: PathBuf,
    pub remote_url: Option<String>,
    pub audio_dir: Option<PathBuf>,
    /// Public URL prefix for files found by the directory scanner
    pub base_url: String,
    pub fallback_styles: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            source: CatalogSourceKind::Manifest,
            manifest_path: PathBuf::from("music-files.json"),
            remote_url: None,
            audio_dir: None,
            base_url: String::new(),
            fallback_styles: DEFAULT_FALLBACK_STYLES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Round engine timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_interval_ms: u64,
    /// Pause after a correct guess before the next song
    pub correct_advance_ms: u64,
    /// Pause after revealing the answer on timeout
    pub reveal_advance_ms: u64,
    /// Pause before skipping a song that failed to play
    pub playback_retry_ms: u64,
    pub start_offset_min_secs: u32,
    pub start_offset_max_secs: u32,
    /// Idle sessions older than this are evicted
    pub session_ttl_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            correct_advance_ms: 750,
            reveal_advance_ms: 2500,
            playback_retry_ms: 2500,
            start_offset_min_secs: 20,
            start_offset_max_secs: 60,
            session_ttl_secs: 30 * 60,
        }
    }
}

impl GameConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn correct_advance(&self) -> Duration {
        Duration::from_millis(self.correct_advance_ms)
    }

    pub fn reveal_advance(&self) -> Duration {
        Duration::from_millis(self.reveal_advance_ms)
    }

    pub fn playback_retry(&self) -> Duration {
        Duration::from_millis(self.playback_retry_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl QuizConfig {
    /// Load configuration using the documented resolution order
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match resolve_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            None => {
                info!("No config file found, using compiled defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QuizConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine and store cannot run with
    pub fn validate(&self) -> Result<()> {
        let game = &self.game;
        if game.tick_interval_ms == 0 {
            return Err(Error::Config("game.tick_interval_ms must be > 0".to_string()));
        }
        if game.start_offset_min_secs > game.start_offset_max_secs {
            return Err(Error::Config(format!(
                "game.start_offset_min_secs ({}) exceeds game.start_offset_max_secs ({})",
                game.start_offset_min_secs, game.start_offset_max_secs
            )));
        }
        if self.leaderboard.default_limit == 0 || self.leaderboard.max_limit == 0 {
            return Err(Error::Config("leaderboard limits must be > 0".to_string()));
        }
        if self.leaderboard.default_limit > self.leaderboard.max_limit {
            return Err(Error::Config(
                "leaderboard.default_limit exceeds leaderboard.max_limit".to_string(),
            ));
        }

        match self.catalog.source {
            CatalogSourceKind::Remote if self.catalog.remote_url.is_none() => Err(Error::Config(
                "catalog.remote_url is required for the remote source".to_string(),
            )),
            CatalogSourceKind::Directory if self.catalog.audio_dir.is_none() => Err(Error::Config(
                "catalog.audio_dir is required for the directory source".to_string(),
            )),
            CatalogSourceKind::Directory => validate_base_url(&self.catalog.base_url),
            _ => Ok(()),
        }
    }
}

/// The directory scanner joins song paths onto `base_url`, so it must be an
/// absolute URL that can carry a path
fn validate_base_url(base_url: &str) -> Result<()> {
    if base_url.trim().is_empty() {
        return Err(Error::Config(
            "catalog.base_url is required for the directory source".to_string(),
        ));
    }
    match reqwest::Url::parse(base_url) {
        Ok(url) if !url.cannot_be_a_base() => Ok(()),
        Ok(_) => Err(Error::Config(format!(
            "catalog.base_url '{}' cannot be a base URL",
            base_url
        ))),
        Err(e) => Err(Error::Config(format!(
            "catalog.base_url '{}' is invalid: {}",
            base_url, e
        ))),
    }
}

/// Locate the config file from the environment or the platform config directory
///
/// Returns the path that should be read, which may not exist.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }

    dirs::config_dir().map(|d| d.join("bmq").join("config.toml"))
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bmq"))
        .unwrap_or_else(|| PathBuf::from("./bmq_data"))
}
