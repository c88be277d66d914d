//! Inventory error taxonomy.

use common::{MovementId, ProductId};
use ledger::{LedgerError, ParseMonthError, ParseMovementTypeError};
use thiserror::Error;

/// Errors surfaced by the coordinator, catalog and report builder.
///
/// Each variant maps to a stable [`code`](InventoryError::code) that clients
/// can branch on without inspecting message text.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Malformed input: bad movement type, quantity, id or month token.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The referenced stock movement does not exist.
    #[error("Stock movement not found: {0}")]
    MovementNotFound(MovementId),

    /// An `out` movement asked for more than is on hand.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The store failed; the transaction was rolled back.
    #[error("Infrastructure error: {0}")]
    Infrastructure(#[from] LedgerError),

    /// A report could not be rendered as CSV.
    #[error("CSV export failed: {0}")]
    Export(#[from] csv::Error),
}

impl InventoryError {
    /// Stable outcome code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "VALIDATION_FAILED",
            InventoryError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            InventoryError::MovementNotFound(_) => "MOVEMENT_NOT_FOUND",
            InventoryError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            InventoryError::Infrastructure(_) | InventoryError::Export(_) => {
                "INFRASTRUCTURE_ERROR"
            }
        }
    }

    /// Returns true when the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            InventoryError::Infrastructure(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<ParseMonthError> for InventoryError {
    fn from(err: ParseMonthError) -> Self {
        InventoryError::Validation(err.to_string())
    }
}

impl From<ParseMovementTypeError> for InventoryError {
    fn from(err: ParseMovementTypeError) -> Self {
        InventoryError::Validation(err.to_string())
    }
}

/// Result type for inventory operations.
pub type Result<T> = std::result::Result<T, InventoryError>;
