//! # Application Errors

use navstore_core::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the navstore binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A JSON payload does not fit the schema.
    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    /// HTTP-like status code used in log lines.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Store(e) => e.status().as_u16(),
            Self::Io { .. } => 500,
            Self::Toml(_) | Self::Json(_) | Self::Payload(_) => 400,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_store_classification() {
        let err = AppError::from(StoreError::NotImplemented("Key type not supported".into()));
        assert_eq!(err.status(), 501);
        assert_eq!(err.to_string(), "Not implemented: Key type not supported");
        assert_eq!(AppError::Payload("x".into()).status(), 400);
    }
}
