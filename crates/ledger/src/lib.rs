//! Storage layer for the stock movement ledger.
//!
//! Products carry a live stock counter; movements form an append-only ledger.
//! Both are written together through a [`StockTransaction`] so a stock change
//! and its ledger entry are always committed or discarded as one.

pub mod error;
pub mod memory;
pub mod movement;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{MovementId, ProductId, UserId};
pub use error::{LedgerError, Result};
pub use memory::InMemoryInventoryStore;
pub use movement::{
    MovementType, NewMovement, NewProduct, ParseMovementTypeError, Product, StockMovement,
};
pub use postgres::PostgresInventoryStore;
pub use query::{Month, MovementQuery, ParseMonthError};
pub use store::{InventoryStore, InventoryStoreExt, StockTransaction};
