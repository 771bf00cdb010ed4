//! Checkout error taxonomy.

use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkout orchestrator and lifecycle manager.
///
/// Business failures (`Validation`, `NotFound`, `InsufficientStock`,
/// `Conflict`, `InvalidState`) are detected before or during a session and
/// always abort it; callers never observe partially applied state.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Missing or malformed input, user-correctable.
    #[error("{0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Requested quantity exceeds available stock. The message surfaces
    /// the current availability so the client can act on it.
    #[error("Insufficient stock. Available: {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// A duplicate action, e.g. a second return request for the same line.
    #[error("{0}")]
    Conflict(String),

    /// The operation is not allowed in the line's current status.
    #[error("{0}")]
    InvalidState(String),

    /// Infrastructure failure in the store.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                requested,
                available,
                ..
            } => CheckoutError::InsufficientStock {
                requested,
                available,
            },
            StoreError::UnitNotFound(_) => CheckoutError::NotFound("Size variant"),
            other => CheckoutError::Store(other),
        }
    }
}
