//! Stock movement endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use inventory::{CreateMovement, RecordedMovement};
use ledger::{InventoryStore, MovementType, StockMovement};
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::auth::Principal;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: i64,
    #[serde(rename = "type")]
    pub movement_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub note: String,
}

// -- Response types --

/// The recorded movement with the product's stock after it was applied.
#[derive(Serialize)]
pub struct MovementCreatedResponse {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub stock_after: i64,
}

impl From<RecordedMovement> for MovementCreatedResponse {
    fn from(recorded: RecordedMovement) -> Self {
        Self {
            movement: recorded.movement,
            stock_after: recorded.stock_after,
        }
    }
}

// -- Handlers --

/// POST /stock-movements : record a movement and adjust stock (staff).
#[tracing::instrument(skip(state, payload), fields(user_id = %principal.user_id))]
pub async fn create<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    payload: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MovementCreatedResponse>), ApiError> {
    principal.require_staff()?;
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let movement_type: MovementType = req
        .movement_type
        .parse()
        .map_err(inventory::InventoryError::from)?;

    let cmd = CreateMovement::new(
        principal.user_id,
        req.product_id.into(),
        movement_type,
        req.quantity,
    )
    .with_note(req.note);

    let recorded = state.coordinator.create_movement(cmd).await?;
    Ok((StatusCode::CREATED, Json(recorded.into())))
}

/// GET /stock-movements : list every movement, newest first.
#[tracing::instrument(skip(state, _principal))]
pub async fn list<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    Ok(Json(state.coordinator.list_movements().await?))
}

/// GET /stock-movements/{id} : load one movement.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<StockMovement>, ApiError> {
    let movement = state
        .coordinator
        .find_movement(parse_id(&id, "movement id")?)
        .await?;
    Ok(Json(movement))
}

/// DELETE /stock-movements/{id} : remove a ledger entry (admin).
///
/// The product's stock is not reconciled; the removed entry is returned.
#[tracing::instrument(skip(state), fields(user_id = %principal.user_id))]
pub async fn delete<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<StockMovement>, ApiError> {
    principal.require_admin()?;

    let removed = state
        .coordinator
        .delete_movement(parse_id(&id, "movement id")?)
        .await?;
    Ok(Json(removed))
}
