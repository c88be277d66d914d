//! Stock movement reports.

use common::{ProductId, UserId};
use ledger::{InventoryStore, Month, MovementQuery, MovementType, StockMovement};
use serde::Deserialize;

use crate::error::{InventoryError, Result};

/// Typed report filter: `month`, `user_id`, `product_id` and `type`, each
/// optional, combined with AND.
pub type ReportFilter = MovementQuery;

/// Raw, untrusted filter tokens as they arrive from a caller.
///
/// Empty tokens count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportParams {
    pub month: Option<String>,
    pub user_id: Option<String>,
    pub product_id: Option<String>,
    #[serde(rename = "type")]
    pub movement_type: Option<String>,
}

impl ReportParams {
    /// Validates every token and builds the typed filter.
    pub fn parse(&self) -> Result<ReportFilter> {
        let mut filter = ReportFilter::new();

        if let Some(month) = present(&self.month) {
            filter = filter.month(month.parse::<Month>()?);
        }
        if let Some(user_id) = present(&self.user_id) {
            filter = filter.user_id(parse_id::<UserId>(user_id, "user_id")?);
        }
        if let Some(product_id) = present(&self.product_id) {
            filter = filter.product_id(parse_id::<ProductId>(product_id, "product_id")?);
        }
        if let Some(movement_type) = present(&self.movement_type) {
            filter = filter.movement_type(movement_type.parse::<MovementType>()?);
        }

        Ok(filter)
    }
}

fn present(token: &Option<String>) -> Option<&str> {
    token.as_deref().filter(|t| !t.is_empty())
}

fn parse_id<T: std::str::FromStr>(token: &str, field: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| InventoryError::Validation(format!("invalid {field} '{token}'")))
}

/// Builds filtered, newest-first views of the ledger.
#[derive(Clone)]
pub struct ReportBuilder<S: InventoryStore> {
    store: S,
}

impl<S: InventoryStore> ReportBuilder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the movements matching `filter`, newest first.
    ///
    /// An empty result is a successful, empty report.
    #[tracing::instrument(skip(self))]
    pub async fn monthly_report(&self, filter: &ReportFilter) -> Result<Vec<StockMovement>> {
        let movements = self.store.scan_movements(filter).await?;
        tracing::debug!(rows = movements.len(), "report built");
        Ok(movements)
    }

    /// Validates raw tokens, then builds the report.
    pub async fn monthly_report_from_params(
        &self,
        params: &ReportParams,
    ) -> Result<Vec<StockMovement>> {
        let filter = params.parse()?;
        self.monthly_report(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(month: &str, user_id: &str, product_id: &str, movement_type: &str) -> ReportParams {
        let token = |s: &str| Some(s.to_string());
        ReportParams {
            month: token(month),
            user_id: token(user_id),
            product_id: token(product_id),
            movement_type: token(movement_type),
        }
    }

    #[test]
    fn empty_params_mean_no_filter() {
        assert_eq!(ReportParams::default().parse().unwrap(), ReportFilter::new());
        assert_eq!(params("", "", "", "").parse().unwrap(), ReportFilter::new());
    }

    #[test]
    fn all_params_parse_into_filter() {
        let filter = params("2024-06", "7", "9", "out").parse().unwrap();
        assert_eq!(filter.month, Some(Month::new(2024, 6).unwrap()));
        assert_eq!(filter.user_id, Some(UserId::new(7)));
        assert_eq!(filter.product_id, Some(ProductId::new(9)));
        assert_eq!(filter.movement_type, Some(MovementType::Out));
    }

    #[test]
    fn malformed_tokens_fail_validation() {
        for bad in [
            params("June", "", "", ""),
            params("", "abc", "", ""),
            params("", "", "1.5", ""),
            params("", "", "", "both"),
            params("", "", "", "OUT"),
        ] {
            let err = bad.parse().unwrap_err();
            assert_eq!(err.code(), "VALIDATION_FAILED", "{bad:?}");
        }
    }
}
