//! Inventory transaction coordinator.
//!
//! The coordinator is the only code path that changes a product's stock. Each
//! [`create_movement`](InventoryCoordinator::create_movement) call runs in a
//! single store transaction: lock the product row, compute the new stock,
//! write it, append the ledger entry, commit. Any failure rolls the whole
//! transaction back.

use std::time::{Duration, Instant};

use common::{MovementId, ProductId, UserId};
use ledger::{
    InventoryStore, LedgerError, MovementType, NewMovement, Product, StockMovement,
    StockTransaction,
};
use serde::Serialize;

use crate::error::{InventoryError, Result};

/// Default upper bound for one `create_movement` transaction.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Command to record a stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMovement {
    /// Verified caller identity from the auth gateway.
    pub acting_user: UserId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub note: String,
}

impl CreateMovement {
    /// Creates a command with an empty note.
    pub fn new(
        acting_user: UserId,
        product_id: ProductId,
        movement_type: MovementType,
        quantity: i64,
    ) -> Self {
        Self {
            acting_user,
            product_id,
            movement_type,
            quantity,
            note: String::new(),
        }
    }

    /// Attaches a free-text note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Checks the command before any storage access.
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(InventoryError::Validation(format!(
                "quantity must be greater than zero, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

/// A committed movement together with the product's resulting stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedMovement {
    pub movement: StockMovement,
    pub stock_after: i64,
}

/// Computes the stock after applying a movement to `product`.
///
/// Fails with `InsufficientStock` if an `out` movement exceeds what is on hand.
pub fn next_stock(product: &Product, movement_type: MovementType, quantity: i64) -> Result<i64> {
    match movement_type {
        MovementType::In => product.stock.checked_add(quantity).ok_or_else(|| {
            InventoryError::Validation(format!(
                "quantity {quantity} would overflow stock of product {}",
                product.id
            ))
        }),
        MovementType::Out if quantity > product.stock => Err(InventoryError::InsufficientStock {
            product_id: product.id,
            available: product.stock,
            requested: quantity,
        }),
        MovementType::Out => Ok(product.stock - quantity),
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Time budget for opening the transaction, waiting for the row lock and
    /// staging the writes. The commit itself is not bounded by it.
    pub transaction_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// Orchestrates the atomic "adjust stock + append ledger entry" operation.
#[derive(Clone)]
pub struct InventoryCoordinator<S: InventoryStore> {
    store: S,
    config: CoordinatorConfig,
}

impl<S: InventoryStore> InventoryCoordinator<S> {
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    pub fn with_config(store: S, config: CoordinatorConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Records a stock movement and updates the product's stock atomically.
    ///
    /// Concurrent calls against the same product are serialized by the
    /// product's row lock, so their net effect always equals some sequential
    /// order. The call is not idempotent: retrying a successful call records
    /// a second movement.
    #[tracing::instrument(
        skip(self, cmd),
        fields(
            product_id = %cmd.product_id,
            movement_type = %cmd.movement_type,
            quantity = cmd.quantity,
        )
    )]
    pub async fn create_movement(&self, cmd: CreateMovement) -> Result<RecordedMovement> {
        let started = Instant::now();

        let outcome = match cmd.validate() {
            Ok(()) => self.run_transaction(&cmd).await,
            Err(err) => Err(err),
        };

        metrics::histogram!("stock_movement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(recorded) => {
                metrics::counter!(
                    "stock_movements_created_total",
                    "type" => cmd.movement_type.as_str()
                )
                .increment(1);
                tracing::info!(
                    movement_id = %recorded.movement.id,
                    stock_after = recorded.stock_after,
                    "stock movement recorded"
                );
            }
            Err(err) => {
                metrics::counter!("stock_movements_rejected_total", "reason" => err.code())
                    .increment(1);
                if let InventoryError::Infrastructure(_) = err {
                    tracing::error!(error = %err, retryable = err.is_retryable(), "stock movement failed");
                } else {
                    tracing::info!(error = %err, "stock movement rejected");
                }
            }
        }

        outcome
    }

    /// Stages the movement under the timeout budget, then commits.
    ///
    /// The commit is not bounded: a timeout is only reported while nothing can
    /// have been committed.
    async fn run_transaction(&self, cmd: &CreateMovement) -> Result<RecordedMovement> {
        let budget = self.config.transaction_timeout;
        let (tx, recorded) = match tokio::time::timeout(budget, self.stage_transaction(cmd)).await
        {
            Ok(staged) => staged?,
            // The dropped future takes the transaction with it, which rolls it back.
            Err(_) => return Err(InventoryError::Infrastructure(LedgerError::Timeout(budget))),
        };

        tx.commit().await?;
        Ok(recorded)
    }

    async fn stage_transaction(
        &self,
        cmd: &CreateMovement,
    ) -> Result<(Box<dyn StockTransaction>, RecordedMovement)> {
        let mut tx = self.store.begin().await?;

        match stage_movement(tx.as_mut(), cmd).await {
            Ok(recorded) => Ok((tx, recorded)),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Removes a movement from the ledger.
    ///
    /// This is an administrative correction of the ledger, not an inventory
    /// reversal: the product's stock counter is left as it is. The removed
    /// record is returned so the caller can log it or compensate explicitly.
    #[tracing::instrument(skip(self))]
    pub async fn delete_movement(&self, movement_id: MovementId) -> Result<StockMovement> {
        let removed = self
            .store
            .delete_movement(movement_id)
            .await?
            .ok_or(InventoryError::MovementNotFound(movement_id))?;

        metrics::counter!("stock_movements_deleted_total").increment(1);
        tracing::warn!(
            %movement_id,
            product_id = %removed.product_id,
            quantity = removed.quantity,
            "stock movement deleted without stock reconciliation"
        );
        Ok(removed)
    }

    /// Loads a single movement.
    #[tracing::instrument(skip(self))]
    pub async fn find_movement(&self, movement_id: MovementId) -> Result<StockMovement> {
        self.store
            .find_movement(movement_id)
            .await?
            .ok_or(InventoryError::MovementNotFound(movement_id))
    }

    /// Lists every movement, most recent first.
    #[tracing::instrument(skip(self))]
    pub async fn list_movements(&self) -> Result<Vec<StockMovement>> {
        Ok(self.store.list_movements().await?)
    }
}

/// Steps 1–4 of a movement, run inside an open transaction.
async fn stage_movement(
    tx: &mut dyn StockTransaction,
    cmd: &CreateMovement,
) -> Result<RecordedMovement> {
    let product = tx
        .lock_product(cmd.product_id)
        .await?
        .ok_or(InventoryError::ProductNotFound(cmd.product_id))?;

    let stock_after = next_stock(&product, cmd.movement_type, cmd.quantity)?;
    tx.write_stock(product.id, stock_after).await?;

    let movement = tx
        .append_movement(NewMovement {
            product_id: product.id,
            user_id: cmd.acting_user,
            movement_type: cmd.movement_type,
            quantity: cmd.quantity,
            note: cmd.note.clone(),
        })
        .await?;

    Ok(RecordedMovement {
        movement,
        stock_after,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(stock: i64) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Widget".to_string(),
            category_id: 1,
            stock,
            version: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inbound_adds_to_stock() {
        assert_eq!(next_stock(&product(3), MovementType::In, 4).unwrap(), 7);
    }

    #[test]
    fn outbound_may_empty_stock() {
        assert_eq!(next_stock(&product(10), MovementType::Out, 10).unwrap(), 0);
    }

    #[test]
    fn outbound_beyond_stock_is_insufficient() {
        let err = next_stock(&product(5), MovementType::Out, 6).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            }
        ));
    }

    #[test]
    fn inbound_overflow_is_rejected() {
        let err = next_stock(&product(i64::MAX), MovementType::In, 1).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[test]
    fn non_positive_quantity_fails_validation() {
        for quantity in [0, -3] {
            let cmd = CreateMovement::new(
                UserId::new(1),
                ProductId::new(1),
                MovementType::In,
                quantity,
            );
            assert_eq!(cmd.validate().unwrap_err().code(), "VALIDATION_FAILED");
        }
    }
}
