use thiserror::Error;

/// Failures surfaced by the planner core.
///
/// `NotFound`, `Conflict` and `Validation` are caller-facing conditions; the
/// remaining variants are generic failures from the storage layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Translate a unique-constraint violation into `Conflict`, leaving any
    /// other storage failure untouched.
    #[must_use]
    pub fn conflict_on_unique(err: rusqlite::Error, message: &str) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Self::Conflict(message.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
