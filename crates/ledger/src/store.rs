use async_trait::async_trait;

use crate::{
    MovementId, MovementQuery, NewMovement, NewProduct, Product, ProductId, Result, StockMovement,
};

/// A unit of work spanning a product stock write and a ledger insert.
///
/// Nothing staged through a transaction is visible to other readers until
/// [`commit`](StockTransaction::commit) succeeds. Dropping a transaction
/// without committing rolls it back and releases every row lock it holds.
#[async_trait]
pub trait StockTransaction: Send {
    /// Loads a product and takes its row lock for the rest of the transaction.
    ///
    /// Blocks while another transaction holds the same product. Returns `None`
    /// if the product does not exist.
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Replaces the stock counter of a product previously locked by this
    /// transaction. Fails with `LockNotHeld` for any other product and with
    /// `NegativeStock` if `stock < 0`.
    async fn write_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()>;

    /// Appends a movement to the ledger, returning it with its assigned id and
    /// creation timestamp.
    async fn append_movement(&mut self, movement: NewMovement) -> Result<StockMovement>;

    /// Makes every staged change visible atomically.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged change.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage for products and the movement ledger.
///
/// All implementations must be thread-safe (Send + Sync). Stock can only be
/// changed through a [`StockTransaction`] obtained from [`begin`](InventoryStore::begin).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn StockTransaction>>;

    /// Registers a product with its opening stock.
    async fn register_product(&self, product: NewProduct) -> Result<Product>;

    /// Looks up a product without locking it.
    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Looks up a single movement.
    async fn find_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>>;

    /// Returns every movement, most recently inserted first.
    async fn list_movements(&self) -> Result<Vec<StockMovement>>;

    /// Removes a movement from the ledger, returning it if it existed.
    ///
    /// Product stock is left untouched.
    async fn delete_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>>;

    /// Returns the movements matching `query`, newest first by creation time
    /// with ties broken by id.
    async fn scan_movements(&self, query: &MovementQuery) -> Result<Vec<StockMovement>>;
}

/// Extension trait providing convenience methods for inventory stores.
#[async_trait]
pub trait InventoryStoreExt: InventoryStore {
    /// Checks if a product exists.
    async fn product_exists(&self, product_id: ProductId) -> Result<bool> {
        Ok(self.find_product(product_id).await?.is_some())
    }

    /// Returns the current stock of a product, if it exists.
    async fn stock_of(&self, product_id: ProductId) -> Result<Option<i64>> {
        Ok(self.find_product(product_id).await?.map(|p| p.stock))
    }
}

// Blanket implementation for all InventoryStore implementations
impl<T: InventoryStore + ?Sized> InventoryStoreExt for T {}

/// Orders movements newest first: creation time descending, then id descending.
pub fn sort_newest_first(movements: &mut [StockMovement]) {
    movements.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.id.cmp(&a.id))
    });
}
