use thiserror::Error;

use common::SizeVariantId;

/// Errors that can occur when interacting with the checkout store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A reservation asked for more stock than the unit holds.
    /// `available` is the stock count at the time of the attempt.
    #[error("insufficient stock for unit {unit_id}: requested {requested}, available {available}")]
    InsufficientStock {
        unit_id: SizeVariantId,
        requested: u32,
        available: u32,
    },

    /// The inventory unit does not exist.
    #[error("inventory unit not found: {0}")]
    UnitNotFound(SizeVariantId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
