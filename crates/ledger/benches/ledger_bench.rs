use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{
    InMemoryInventoryStore, InventoryStore, MovementQuery, MovementType, NewMovement, NewProduct,
    ProductId, UserId,
};

fn new_movement(product_id: ProductId, movement_type: MovementType) -> NewMovement {
    NewMovement {
        product_id,
        user_id: UserId::new(1),
        movement_type,
        quantity: 1,
        note: "bench".to_string(),
    }
}

async fn seeded_store(movements: usize) -> (InMemoryInventoryStore, ProductId) {
    let store = InMemoryInventoryStore::new();
    let product = store
        .register_product(NewProduct::new("Widget", 1, 0))
        .await
        .unwrap();

    for i in 0..movements {
        let kind = if i % 2 == 0 {
            MovementType::In
        } else {
            MovementType::Out
        };
        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product.id).await.unwrap();
        tx.append_movement(new_movement(product.id, kind))
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    (store, product.id)
}

fn bench_transaction_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product_id) = rt.block_on(seeded_store(0));

    c.bench_function("ledger/lock_write_append_commit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = store.begin().await.unwrap();
                let product = tx.lock_product(product_id).await.unwrap().unwrap();
                tx.write_stock(product_id, product.stock + 1).await.unwrap();
                tx.append_movement(new_movement(product_id, MovementType::In))
                    .await
                    .unwrap();
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_scan_1000(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, _) = rt.block_on(seeded_store(1_000));
    let query = MovementQuery::new().movement_type(MovementType::Out);

    c.bench_function("ledger/scan_1000_filtered", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.scan_movements(&query).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_transaction_round_trip, bench_scan_1000);
criterion_main!(benches);
