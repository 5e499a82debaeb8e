use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default; the config file is optional.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// The `tracks.csv` metadata table.
    pub metadata_path: PathBuf,
    /// Directory of audio files to reorganize.
    pub audio_dir: PathBuf,
    /// Where genre folders go. Unset means `<audio_dir>_genres`.
    pub output_dir: Option<PathBuf>,
    /// Audio file extension to pick up.
    pub extension: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("fma_metadata").join("tracks.csv"),
            audio_dir: PathBuf::from("fma_datasets").join("fma_small"),
            output_dir: None,
            extension: crate::DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/fmaprep/config.toml`.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load from an explicit path, logging a warning and falling back to
    /// defaults if it can't be read or parsed.
    pub fn load_from(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
