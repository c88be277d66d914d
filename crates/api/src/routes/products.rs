//! Product registration and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use ledger::{InventoryStore, NewProduct, Product};
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::auth::Principal;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category_id: i64,
    #[serde(default)]
    pub stock: i64,
}

/// POST /products : register a product with its opening stock (admin).
#[tracing::instrument(skip(state, payload), fields(user_id = %principal.user_id))]
pub async fn create<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    principal.require_admin()?;
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let product = state
        .catalog
        .register(NewProduct::new(req.name, req.category_id, req.stock))
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id} : load a product with its current stock.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = state.catalog.get(parse_id(&id, "product id")?).await?;
    Ok(Json(product))
}
