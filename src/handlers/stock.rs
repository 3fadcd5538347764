use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementFilters {
    pub product_id: Option<Uuid>,
    pub limit: Option<u64>,
}

/// Most recent stock movements, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/stock/movements",
    params(MovementFilters),
    responses(
        (status = 200, description = "Movements returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_movements(
    State(state): State<AppState>,
    Query(filters): Query<MovementFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let movements = state
        .ledger
        .query(filters.product_id, filters.limit)
        .await?;
    Ok(Json(ApiResponse::success(movements)))
}

/// The configured branch directory, in order, with the default flagged.
#[utoipa::path(
    get,
    path = "/api/v1/branches",
    responses((status = 200, description = "Branches returned")),
    tag = "stock"
)]
pub async fn list_branches(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.branches.all().to_vec()))
}
