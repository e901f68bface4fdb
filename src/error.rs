use std::path::PathBuf;
use thiserror::Error;

use crate::scalar::{ParseError, ScalarKind};

/// Error returned by a file decoder.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum LayerfigError {
    #[error("unable to apply config source[{index}]: {source}")]
    Source {
        index: usize,
        source: Box<LayerfigError>,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{var} ({path}): {source}")]
    EnvValue {
        var: String,
        path: String,
        source: ParseError,
    },

    #[error("{var} ({path}): unhandled type")]
    UnhandledType { var: String, path: String },

    #[error("{}", join(.0))]
    Traversal(Vec<LayerfigError>),

    #[error("flags not bound to the config: {}", orphans.join(", "))]
    Wiring { orphans: Vec<String> },

    #[error("type mismatch at '{path}': expected {expected}")]
    TypeMismatch { path: String, expected: ScalarKind },

    #[error("'{path}' cannot be addressed in the config")]
    Unaddressable { path: String },

    #[error("unable to open config file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to decode config {path}: {source}")]
    Decode { path: PathBuf, source: DecodeError },

    #[error("unknown key '{key}' (line {line})")]
    UnknownKey { key: String, line: usize },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid argument for flag {flag}: {source}")]
    FlagValue {
        flag: String,
        source: Box<LayerfigError>,
    },

    #[error("invalid flag: {0}")]
    InvalidFlag(String),
}

impl LayerfigError {
    /// Fold accumulated errors: none is success, one is returned as is,
    /// several become [`LayerfigError::Traversal`].
    pub fn collect(mut errors: Vec<LayerfigError>) -> Result<(), LayerfigError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(LayerfigError::Traversal(errors)),
        }
    }

    /// Every leaf error, with `Traversal` and `Source` wrappers looked through.
    pub fn flatten(&self) -> Vec<&LayerfigError> {
        match self {
            LayerfigError::Traversal(errors) => errors.iter().flat_map(|e| e.flatten()).collect(),
            LayerfigError::Source { source, .. } => source.flatten(),
            other => vec![other],
        }
    }
}

fn join(errors: &[LayerfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
