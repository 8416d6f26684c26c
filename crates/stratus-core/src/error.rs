//! Core error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading inputs and assembling a placement request.
///
/// Every variant is fatal to the request it belongs to and is surfaced to the
/// caller before any model is built.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("catalog {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("topology: {0}")]
    Topology(String),

    #[error("config: {0}")]
    Config(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CoreError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
