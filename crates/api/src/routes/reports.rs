//! Stock movement report endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use inventory::{ReportParams, export_csv, report_filename};
use ledger::InventoryStore;
use serde::Deserialize;

use super::AppState;
use crate::auth::Principal;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct ReportQuery {
    #[serde(flatten)]
    pub filter: ReportParams,
    pub export: Option<String>,
}

/// GET /reports/stock-movements : filtered movement report (admin).
///
/// `export=csv` returns a CSV attachment instead of JSON. Either form answers
/// 404 when nothing matches.
#[tracing::instrument(skip(state, query), fields(user_id = %principal.user_id))]
pub async fn stock_movements<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ApiError> {
    principal.require_admin()?;

    let as_csv = match query.export.as_deref().map(str::trim) {
        None | Some("") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "invalid export format '{other}', only 'csv' is supported"
            )));
        }
    };

    let movements = state
        .reports
        .monthly_report_from_params(&query.filter)
        .await?;

    if movements.is_empty() {
        return Err(ApiError::ReportNotFound);
    }

    if as_csv {
        metrics::counter!("stock_reports_generated_total", "format" => "csv").increment(1);
        let disposition = format!(
            "attachment; filename={}",
            report_filename(chrono::Utc::now())
        );
        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            export_csv(&movements)?,
        )
            .into_response());
    }

    metrics::counter!("stock_reports_generated_total", "format" => "json").increment(1);
    Ok(Json(movements).into_response())
}
