//! Error types for Cadence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed period, date, scope or field value supplied by a caller
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The record exists but belongs to another user
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl Error {
    /// Storage failures that a later scheduler tick can simply retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Pool(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Database(rusqlite::Error::InvalidQuery).is_transient());
        assert!(!Error::NotFound("budget 1".into()).is_transient());
        assert!(!Error::Validation("bad scope".into()).is_transient());
        assert!(!Error::Forbidden("transaction 3".into()).is_transient());
    }
}
