pub mod audit;
pub mod user;

use thiserror::Error;

/// Failures of the credential store and audit log.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("User not found")]
    NotFound,

    /// A stored row could not be mapped back to domain types.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl StoreError {
    /// Maps unique-constraint violations to [`StoreError::DuplicateUsername`].
    pub(crate) fn from_insert(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => Self::DuplicateUsername,
            _ => Self::Database(err),
        }
    }
}
