use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::stock_transfer::TransferStatus;
use crate::errors::ServiceError;
use crate::services::stock_transfers::CreateTransferInput;
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub struct TransferFilters {
    pub status: Option<TransferStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelTransferRequest {
    pub reason: String,
}

/// List transfers, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/transfers",
    params(("status" = Option<String>, Query, description = "Filter by lifecycle status")),
    responses((status = 200, description = "Transfers returned")),
    tag = "transfers"
)]
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(filters): Query<TransferFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfers = state.transfers.list(filters.status).await?;
    Ok(Json(ApiResponse::success(transfers)))
}

/// Get a transfer with its item lines.
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.get(id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Request a transfer of declared quantities between two branches.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferInput,
    responses(
        (status = 201, description = "Transfer created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateTransferInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.create(input, user.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(transfer))))
}

/// Approve a pending transfer.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/approve",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer approved"),
        (status = 400, description = "Invalid state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn approve_transfer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.approve(id, user.into()).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Dispatch an approved transfer, decrementing source-branch stock.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/ship",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer dispatched"),
        (status = 400, description = "Invalid state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn ship_transfer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.ship(id, user.into()).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Receive an in-transit transfer at the destination branch.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/receive",
    params(("id" = Uuid, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer received"),
        (status = 400, description = "Invalid state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn receive_transfer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.receive(id, user.into()).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// Cancel a transfer that has not shipped.
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transfer id")),
    request_body = CancelTransferRequest,
    responses(
        (status = 200, description = "Transfer cancelled"),
        (status = 400, description = "Invalid state", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "transfers"
)]
pub async fn cancel_transfer(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelTransferRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let transfer = state.transfers.cancel(id, request.reason).await?;
    Ok(Json(ApiResponse::success(transfer)))
}
