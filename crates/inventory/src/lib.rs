//! Inventory consistency engine.
//!
//! [`InventoryCoordinator`] is the single entry point for stock changes: it
//! records a movement and adjusts the product's stock in one transaction.
//! [`ReportBuilder`] and [`export_csv`] provide the read side.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod report;

pub use catalog::ProductCatalog;
pub use coordinator::{
    CoordinatorConfig, CreateMovement, DEFAULT_TRANSACTION_TIMEOUT, InventoryCoordinator,
    RecordedMovement, next_stock,
};
pub use error::{InventoryError, Result};
pub use export::{CSV_HEADER, TIMESTAMP_FORMAT, export_csv, report_filename};
pub use report::{ReportBuilder, ReportFilter, ReportParams};
