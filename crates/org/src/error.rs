//! Organization error types

use thiserror::Error;

/// Errors from membership and invitation operations
#[derive(Debug, Error)]
pub enum OrgError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for OrgError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => OrgError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // PostgreSQL unique violation
                if db_err.code().as_deref() == Some("23505") {
                    return OrgError::Conflict("resource already exists".to_string());
                }
                OrgError::Database(db_err.to_string())
            }
            _ => OrgError::Database(err.to_string()),
        }
    }
}

pub type OrgResult<T> = Result<T, OrgError>;
