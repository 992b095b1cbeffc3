use common::BookId;
use thiserror::Error;

use crate::memory::FailPoint;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The database aborted the unit of work to keep it serializable.
    /// Retrying the whole unit may succeed.
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    /// A stock decrement would have taken stock below zero.
    #[error("Insufficient stock for book {book_id}: requested {requested}")]
    InsufficientStock { book_id: BookId, requested: i32 },

    /// A stock decrement was asked for a non-positive quantity.
    #[error("Invalid stock decrement for book {book_id}: {quantity}")]
    InvalidQuantity { book_id: BookId, quantity: i32 },

    /// A row targeted by an update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A failure injected into the in-memory store.
    #[error("Simulated failure at {0:?}")]
    Simulated(FailPoint),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // 40001 serialization_failure, 40P01 deadlock_detected
        if let sqlx::Error::Database(ref db_err) = err
            && matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        {
            return StoreError::SerializationFailure(db_err.message().to_string());
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
