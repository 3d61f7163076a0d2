// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Network failure or non-success status from the remote store.
    ///
    /// `status` is `None` when no HTTP response was received at all.
    #[error("transport error (status {status:?}): {body}")]
    Transport { status: Option<u16>, body: String },

    /// The requested entry does not exist in the remote store.
    #[error("config not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("change handler failed for {key}: {source}")]
    Handler {
        key: String,
        #[source]
        source: Box<SkillwatchError>,
    },

    #[error("could not establish any watch items: {0}")]
    Seed(String),

    #[error("uniformId mismatch: skill.json has '{skill}', but resource '{resource}' has '{found}'")]
    UniformIdMismatch {
        skill: String,
        resource: String,
        found: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SkillwatchError {
    pub fn transport(status: Option<u16>, body: impl Into<String>) -> Self {
        SkillwatchError::Transport {
            status,
            body: body.into(),
        }
    }

    /// True when this error means "the entry is absent" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SkillwatchError::NotFound(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SkillwatchError>;
