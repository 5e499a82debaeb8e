pub mod analyzer;
pub mod config;
pub mod dataset;
pub mod metadata;
pub mod reorganize;

/// Audio file extension picked up by default
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Application name for XDG paths
pub const APP_NAME: &str = "fmaprep";
