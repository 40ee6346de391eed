// src/error.rs

//! Error types shared by the rename engine and the proxy

use thiserror::Error;

/// Library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by wheel rewriting and the proxy transform
#[derive(Error, Debug)]
pub enum Error {
    /// The ZIP container or one of its entries is unreadable
    #[error("Corrupt archive at {path}: {reason}")]
    CorruptArchive { path: String, reason: String },

    /// METADATA has no `Name:` header
    #[error("Missing Name field in {path}")]
    MissingNameField { path: String },

    /// The wheel filename does not follow the canonical encoding
    #[error("Invalid wheel filename: {0}")]
    InvalidWheelFilename(String),

    /// The requested name fails the distribution name grammar
    #[error("Invalid distribution name: {0}")]
    InvalidDistributionName(String),

    /// A relocated entry would overwrite an entry already in the archive
    #[error("Rename conflict: {path} already exists in the archive")]
    RenameConflict { path: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid version specifier: {0}")]
    InvalidSpecifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Upstream index unreachable or returned an unusable response
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// Shorthand for an archive-level corruption error
    pub fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
