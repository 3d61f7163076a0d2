// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SkillwatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SkillwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_server(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    let host = cfg.server.host.as_deref().map(str::trim).unwrap_or_default();
    if host.contains("://") {
        return Err(SkillwatchError::ConfigError(format!(
            "[server].host must not include a scheme (got '{host}')"
        )));
    }
    if cfg.server.port == Some(0) {
        return Err(SkillwatchError::ConfigError(
            "[server].port must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    let w = &cfg.watch;

    if w.long_poll_timeout_ms == 0 {
        return Err(SkillwatchError::ConfigError(
            "[watch].long_poll_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    // The client must outlast the server's long-poll window.
    if w.request_timeout_ms <= w.long_poll_timeout_ms {
        return Err(SkillwatchError::ConfigError(format!(
            "[watch].request_timeout_ms ({}) must be greater than long_poll_timeout_ms ({})",
            w.request_timeout_ms, w.long_poll_timeout_ms
        )));
    }

    if w.materialize_retries == 0 {
        return Err(SkillwatchError::ConfigError(
            "[watch].materialize_retries must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
