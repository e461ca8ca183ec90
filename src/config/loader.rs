// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSettingsFile, SettingsFile};
use crate::errors::Result;

/// Load a settings file from a given path and return the raw `RawSettingsFile`.
///
/// This only performs TOML deserialization; it does **not** validate. Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettingsFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawSettingsFile> {
    let settings: RawSettingsFile = toml::from_str(contents)?;
    Ok(settings)
}

/// Load a settings file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - a non-empty interpreter command and launcher path,
///   - valid prompt/error regexes and durations,
///   - a non-zero output buffer.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SettingsFile> {
    let raw = load_from_path(&path)?;
    SettingsFile::try_from(raw)
}

/// Default settings path: `Buildlane.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Buildlane.toml")
}
