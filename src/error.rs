use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("backend '{backend}' is not supported on this device (expected {hint})")]
    NotSupported { backend: String, hint: String },

    #[error("unknown backend '{0}' (valid backends: configfs, udc, sysfs)")]
    UnknownBackend(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("verification of {} failed: expected '{expected}', got '{actual}'", .path.display())]
    VerifyFailed {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Busy: {0}")]
    Busy(String),
}

impl AppError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
