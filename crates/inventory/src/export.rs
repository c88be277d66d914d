//! CSV export of stock movement reports.

use chrono::{DateTime, Utc};
use csv::{Terminator, WriterBuilder};
use ledger::StockMovement;

use crate::error::{InventoryError, Result};

/// Column headers, in output order.
pub const CSV_HEADER: [&str; 7] = [
    "ID",
    "Product ID",
    "User ID",
    "Type",
    "Quantity",
    "Note",
    "Created At",
];

/// Format of the `Created At` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders movements as CSV: header first, then one row per movement in the
/// order given. Rows end with `\n`.
pub fn export_csv(movements: &[StockMovement]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(64 * (movements.len() + 1)));

    writer.write_record(CSV_HEADER)?;
    for m in movements {
        writer.write_record([
            m.id.to_string(),
            m.product_id.to_string(),
            m.user_id.to_string(),
            m.movement_type.as_str().to_string(),
            m.quantity.to_string(),
            m.note.clone(),
            m.created_at.format(TIMESTAMP_FORMAT).to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| InventoryError::Export(csv::Error::from(err.into_error())))
}

/// Attachment file name for an export generated at `at`.
pub fn report_filename(at: DateTime<Utc>) -> String {
    format!("stock_report_{}.csv", at.format("%Y%m%d_%H%M%S"))
}
