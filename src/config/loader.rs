// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SkillwatchError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = expand_tilde(path.as_ref());
    if !path.exists() {
        return Err(SkillwatchError::ConfigError(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    let contents = fs::read_to_string(&path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the file at `path` if it exists, otherwise start from defaults.
///
/// Used for the default config location, which is optional.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    if expand_tilde(path.as_ref()).exists() {
        load_from_path(path)
    } else {
        Ok(RawConfigFile::default())
    }
}

/// Default config path: `skillwatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("skillwatch.toml")
}

/// Expand a leading `~` to the user's home directory.
///
/// Paths without a leading `~`, or when no home directory is known, are
/// returned unchanged.
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
