use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{OwnedMutexGuard, RwLock};

use crate::{
    LedgerError, MovementId, MovementQuery, NewMovement, NewProduct, Product, ProductId, Result,
    StockMovement,
    store::{InventoryStore, StockTransaction, sort_newest_first},
};

#[derive(Default)]
struct MemoryState {
    products: HashMap<ProductId, Product>,
    movements: BTreeMap<MovementId, StockMovement>,
}

/// Test hooks: injected failures and a frozen clock.
#[derive(Default)]
struct Faults {
    fail_next_append: AtomicBool,
    fail_next_commit: AtomicBool,
    commit_delay: Mutex<Option<Duration>>,
    frozen_now: Mutex<Option<DateTime<Utc>>>,
}

type RowLock = Arc<tokio::sync::Mutex<()>>;

/// In-memory inventory store implementation for testing.
///
/// Provides the same transactional guarantees as the PostgreSQL store: each
/// product has its own async row lock held from `lock_product` until the
/// transaction commits or is dropped, and staged writes become visible in a
/// single step on commit.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<MemoryState>>,
    row_locks: Arc<Mutex<HashMap<ProductId, RowLock>>>,
    next_product_id: Arc<AtomicI64>,
    next_movement_id: Arc<AtomicI64>,
    faults: Arc<Faults>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of movements stored.
    pub async fn movement_count(&self) -> usize {
        self.state.read().await.movements.len()
    }

    /// Makes the next `append_movement` call fail with a retryable error.
    pub fn fail_next_append(&self) {
        self.faults.fail_next_append.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit` call fail with a retryable error.
    pub fn fail_next_commit(&self) {
        self.faults.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next `commit` take at least `delay` before applying.
    pub fn delay_next_commit(&self, delay: Duration) {
        *self
            .faults
            .commit_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Stamps every subsequent movement with `at` instead of the wall clock.
    pub fn freeze_clock(&self, at: DateTime<Utc>) {
        *self
            .faults
            .frozen_now
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    fn now(&self) -> DateTime<Utc> {
        let frozen = *self
            .faults
            .frozen_now
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        frozen.unwrap_or_else(Utc::now)
    }

    fn row_lock(&self, product_id: ProductId) -> RowLock {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(product_id)
            .or_default()
            .clone()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn begin(&self) -> Result<Box<dyn StockTransaction>> {
        Ok(Box::new(InMemoryStockTransaction {
            store: self.clone(),
            held: HashMap::new(),
            staged_stock: HashMap::new(),
            staged_movements: Vec::new(),
        }))
    }

    async fn register_product(&self, product: NewProduct) -> Result<Product> {
        if product.opening_stock < 0 {
            return Err(LedgerError::NegativeStock {
                product_id: ProductId::new(0),
                stock: product.opening_stock,
            });
        }

        let id = ProductId::new(self.next_product_id.fetch_add(1, Ordering::SeqCst) + 1);

        let product = Product {
            id,
            name: product.name,
            category_id: product.category_id,
            stock: product.opening_stock,
            version: 1,
            created_at: self.now(),
        };
        self.state
            .write()
            .await
            .products
            .insert(id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&product_id).cloned())
    }

    async fn find_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>> {
        Ok(self.state.read().await.movements.get(&movement_id).cloned())
    }

    async fn list_movements(&self) -> Result<Vec<StockMovement>> {
        let state = self.state.read().await;
        Ok(state.movements.values().rev().cloned().collect())
    }

    async fn delete_movement(&self, movement_id: MovementId) -> Result<Option<StockMovement>> {
        Ok(self.state.write().await.movements.remove(&movement_id))
    }

    async fn scan_movements(&self, query: &MovementQuery) -> Result<Vec<StockMovement>> {
        let state = self.state.read().await;
        let mut movements: Vec<_> = state
            .movements
            .values()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        sort_newest_first(&mut movements);
        Ok(movements)
    }
}

/// Transaction over an [`InMemoryInventoryStore`].
pub struct InMemoryStockTransaction {
    store: InMemoryInventoryStore,
    held: HashMap<ProductId, OwnedMutexGuard<()>>,
    staged_stock: HashMap<ProductId, i64>,
    staged_movements: Vec<StockMovement>,
}

#[async_trait]
impl StockTransaction for InMemoryStockTransaction {
    async fn lock_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        if !self.held.contains_key(&product_id) {
            if self.store.find_product(product_id).await?.is_none() {
                return Ok(None);
            }
            let guard = self.store.row_lock(product_id).lock_owned().await;
            self.held.insert(product_id, guard);
        }

        let product = self.store.find_product(product_id).await?;
        Ok(product.map(|mut p| {
            if let Some(&stock) = self.staged_stock.get(&product_id) {
                p.stock = stock;
            }
            p
        }))
    }

    async fn write_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()> {
        if !self.held.contains_key(&product_id) {
            return Err(LedgerError::LockNotHeld(product_id));
        }
        if stock < 0 {
            return Err(LedgerError::NegativeStock { product_id, stock });
        }
        self.staged_stock.insert(product_id, stock);
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<StockMovement> {
        if self
            .store
            .faults
            .fail_next_append
            .swap(false, Ordering::SeqCst)
        {
            return Err(LedgerError::Unavailable(
                "injected failure appending movement".to_string(),
            ));
        }
        if self.store.find_product(movement.product_id).await?.is_none() {
            return Err(LedgerError::InvalidRow(format!(
                "movement references unknown product {}",
                movement.product_id
            )));
        }

        let id = MovementId::new(self.store.next_movement_id.fetch_add(1, Ordering::SeqCst) + 1);
        let movement = StockMovement {
            id,
            product_id: movement.product_id,
            user_id: movement.user_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            note: movement.note,
            created_at: self.store.now(),
        };
        self.staged_movements.push(movement.clone());
        Ok(movement)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self
            .store
            .faults
            .fail_next_commit
            .swap(false, Ordering::SeqCst)
        {
            return Err(LedgerError::Unavailable(
                "injected failure committing transaction".to_string(),
            ));
        }

        let delay = self
            .store
            .faults
            .commit_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let this = *self;
        let mut state = this.store.state.write().await;
        for (product_id, stock) in this.staged_stock {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = stock;
                product.version += 1;
            }
        }
        for movement in this.staged_movements {
            state.movements.insert(movement.id, movement);
        }
        drop(state);

        // Row locks are released only after the writes are visible.
        drop(this.held);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::{MovementType, UserId};

    fn new_movement(product_id: ProductId, movement_type: MovementType) -> NewMovement {
        NewMovement {
            product_id,
            user_id: UserId::new(1),
            movement_type,
            quantity: 1,
            note: String::new(),
        }
    }

    async fn seeded(stock: i64) -> (InMemoryInventoryStore, ProductId) {
        let store = InMemoryInventoryStore::new();
        let product = store
            .register_product(NewProduct::new("Widget", 1, stock))
            .await
            .unwrap();
        (store, product.id)
    }

    #[tokio::test]
    async fn register_assigns_sequential_ids() {
        let store = InMemoryInventoryStore::new();
        let a = store
            .register_product(NewProduct::new("A", 1, 0))
            .await
            .unwrap();
        let b = store
            .register_product(NewProduct::new("B", 1, 5))
            .await
            .unwrap();

        assert_eq!(a.id, ProductId::new(1));
        assert_eq!(b.id, ProductId::new(2));
        assert_eq!(b.stock, 5);
    }

    #[tokio::test]
    async fn register_rejects_negative_opening_stock() {
        let store = InMemoryInventoryStore::new();
        let result = store.register_product(NewProduct::new("A", 1, -1)).await;
        assert!(matches!(result, Err(LedgerError::NegativeStock { .. })));

        // A rejected registration does not burn an id.
        let next = store
            .register_product(NewProduct::new("B", 1, 0))
            .await
            .unwrap();
        assert_eq!(next.id, ProductId::new(1));
    }

    #[tokio::test]
    async fn committed_changes_become_visible() {
        let (store, product_id) = seeded(10).await;

        let mut tx = store.begin().await.unwrap();
        let product = tx.lock_product(product_id).await.unwrap().unwrap();
        tx.write_stock(product_id, product.stock - 1).await.unwrap();
        let movement = tx
            .append_movement(new_movement(product_id, MovementType::Out))
            .await
            .unwrap();

        // Not visible before commit
        assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.movement_count().await, 0);

        tx.commit().await.unwrap();

        let product = store.find_product(product_id).await.unwrap().unwrap();
        assert_eq!(product.stock, 9);
        assert_eq!(product.version, 2);
        assert_eq!(
            store.find_movement(movement.id).await.unwrap(),
            Some(movement)
        );
    }

    #[tokio::test]
    async fn dropped_transaction_discards_changes() {
        let (store, product_id) = seeded(10).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_product(product_id).await.unwrap();
            tx.write_stock(product_id, 3).await.unwrap();
            tx.append_movement(new_movement(product_id, MovementType::Out))
                .await
                .unwrap();
        }

        assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.movement_count().await, 0);

        // Lock was released with the dropped transaction
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_product(product_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn write_requires_row_lock() {
        let (store, product_id) = seeded(10).await;

        let mut tx = store.begin().await.unwrap();
        let result = tx.write_stock(product_id, 5).await;
        assert!(matches!(result, Err(LedgerError::LockNotHeld(id)) if id == product_id));
    }

    #[tokio::test]
    async fn write_rejects_negative_stock() {
        let (store, product_id) = seeded(1).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product_id).await.unwrap();
        let result = tx.write_stock(product_id, -1).await;
        assert!(matches!(result, Err(LedgerError::NegativeStock { .. })));
    }

    #[tokio::test]
    async fn lock_on_missing_product_returns_none() {
        let store = InMemoryInventoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_product(ProductId::new(9999)).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn row_lock_blocks_second_transaction() {
        let (store, product_id) = seeded(10).await;

        let mut first = store.begin().await.unwrap();
        first.lock_product(product_id).await.unwrap();

        let contender = store.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_product(product_id).await.unwrap().unwrap().stock
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.write_stock(product_id, 4).await.unwrap();
        first.commit().await.unwrap();

        // The waiter observes the committed value, never the stale one
        assert_eq!(waiter.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn injected_append_failure_fires_once() {
        let (store, product_id) = seeded(10).await;
        store.fail_next_append();

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product_id).await.unwrap();
        let err = tx
            .append_movement(new_movement(product_id, MovementType::In))
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        assert!(
            tx.append_movement(new_movement(product_id, MovementType::In))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn injected_commit_failure_applies_nothing() {
        let (store, product_id) = seeded(10).await;
        store.fail_next_commit();

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product_id).await.unwrap();
        tx.write_stock(product_id, 11).await.unwrap();
        tx.append_movement(new_movement(product_id, MovementType::In))
            .await
            .unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.movement_count().await, 0);
    }

    #[tokio::test]
    async fn scan_orders_newest_first_and_filters() {
        let (store, product_id) = seeded(100).await;
        let stamps = [
            Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 20, 8, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
        ];
        for (i, at) in stamps.iter().enumerate() {
            store.freeze_clock(*at);
            let kind = if i % 2 == 0 {
                MovementType::In
            } else {
                MovementType::Out
            };
            let mut tx = store.begin().await.unwrap();
            tx.lock_product(product_id).await.unwrap();
            tx.append_movement(new_movement(product_id, kind))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let june = MovementQuery::new().month("2024-06".parse().unwrap());
        let found = store.scan_movements(&june).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].created_at, stamps[2]);
        assert_eq!(found[1].created_at, stamps[1]);

        let june_out = june.movement_type(MovementType::Out);
        let found = store.scan_movements(&june_out).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].created_at, stamps[1]);
    }

    #[tokio::test]
    async fn scan_breaks_timestamp_ties_by_id() {
        let (store, product_id) = seeded(0).await;
        store.freeze_clock(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        for _ in 0..3 {
            let mut tx = store.begin().await.unwrap();
            tx.lock_product(product_id).await.unwrap();
            tx.append_movement(new_movement(product_id, MovementType::In))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let ids: Vec<i64> = store
            .scan_movements(&MovementQuery::new())
            .await
            .unwrap()
            .iter()
            .map(|m| m.id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn delete_leaves_stock_untouched() {
        let (store, product_id) = seeded(10).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product_id).await.unwrap();
        tx.write_stock(product_id, 7).await.unwrap();
        let movement = tx
            .append_movement(new_movement(product_id, MovementType::Out))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let removed = store.delete_movement(movement.id).await.unwrap();
        assert_eq!(removed.map(|m| m.id), Some(movement.id));
        assert!(store.delete_movement(movement.id).await.unwrap().is_none());
        assert_eq!(store.find_product(product_id).await.unwrap().unwrap().stock, 7);
    }

    #[tokio::test]
    async fn list_returns_most_recent_first() {
        let (store, product_id) = seeded(0).await;
        for _ in 0..2 {
            let mut tx = store.begin().await.unwrap();
            tx.lock_product(product_id).await.unwrap();
            tx.append_movement(new_movement(product_id, MovementType::In))
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let listed = store.list_movements().await.unwrap();
        assert_eq!(listed[0].id, MovementId::new(2));
        assert_eq!(listed[1].id, MovementId::new(1));
    }
}
