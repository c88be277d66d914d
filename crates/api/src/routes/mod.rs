//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod movements;
pub mod products;
pub mod reports;

use std::str::FromStr;

use inventory::{InventoryCoordinator, ProductCatalog, ReportBuilder};
use ledger::InventoryStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: InventoryStore> {
    pub coordinator: InventoryCoordinator<S>,
    pub catalog: ProductCatalog<S>,
    pub reports: ReportBuilder<S>,
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {what} '{raw}'")))
}
