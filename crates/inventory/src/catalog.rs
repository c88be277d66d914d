//! Minimal product catalog: registration and lookup.
//!
//! Stock can be set only once, at registration. Every later change goes
//! through the coordinator.

use common::ProductId;
use ledger::{InventoryStore, NewProduct, Product};

use crate::error::{InventoryError, Result};

#[derive(Clone)]
pub struct ProductCatalog<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> ProductCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a product after validating its fields.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn register(&self, product: NewProduct) -> Result<Product> {
        let name = product.name.trim();
        if name.is_empty() {
            return Err(InventoryError::Validation(
                "product name is required".to_string(),
            ));
        }
        if name.chars().count() > 100 {
            return Err(InventoryError::Validation(
                "product name must be at most 100 characters".to_string(),
            ));
        }
        if product.category_id <= 0 {
            return Err(InventoryError::Validation(
                "category_id is required".to_string(),
            ));
        }
        if product.opening_stock < 0 {
            return Err(InventoryError::Validation(
                "stock must be zero or greater".to_string(),
            ));
        }

        let product = NewProduct {
            name: name.to_string(),
            ..product
        };
        let registered = self.store.register_product(product).await?;
        tracing::info!(product_id = %registered.id, stock = registered.stock, "product registered");
        Ok(registered)
    }

    /// Loads a product by id.
    pub async fn get(&self, product_id: ProductId) -> Result<Product> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(InventoryError::ProductNotFound(product_id))
    }
}
