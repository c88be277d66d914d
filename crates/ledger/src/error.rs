use std::time::Duration;

use thiserror::Error;

use crate::ProductId;

/// Postgres SQLSTATE codes that indicate a transient failure worth retrying.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Errors that can occur when interacting with the inventory store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A stock write was attempted for a product the transaction has not locked.
    #[error("Product {0} is not locked by this transaction")]
    LockNotHeld(ProductId),

    /// A stock write would have driven the counter below zero.
    #[error("Stock for product {product_id} cannot become negative (attempted {stock})")]
    NegativeStock { product_id: ProductId, stock: i64 },

    /// A stored row could not be mapped back into the data model.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// The store could not complete the operation; safe to retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The transaction did not finish within its time budget and was rolled back.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Returns true when the failure is transient and the whole operation may
    /// be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Unavailable(_) | LedgerError::Timeout(_) => true,
            LedgerError::Database(err) => match err {
                sqlx::Error::Database(db_err) => db_err
                    .code()
                    .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())),
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
                _ => false,
            },
            LedgerError::LockNotHeld(_)
            | LedgerError::NegativeStock { .. }
            | LedgerError::InvalidRow(_)
            | LedgerError::Migration(_) => false,
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(LedgerError::Unavailable("connection reset".into()).is_retryable());
        assert!(LedgerError::Timeout(Duration::from_millis(50)).is_retryable());
        assert!(LedgerError::Database(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn logic_failures_are_not_retryable() {
        assert!(!LedgerError::LockNotHeld(ProductId::new(1)).is_retryable());
        assert!(
            !LedgerError::NegativeStock {
                product_id: ProductId::new(1),
                stock: -1
            }
            .is_retryable()
        );
        assert!(!LedgerError::Database(sqlx::Error::RowNotFound).is_retryable());
    }
}
