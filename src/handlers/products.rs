use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::services::product_catalog::{
    CreateProductInput, CreateWithVariantsInput, ProductFilters, UpdateProductInput,
};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub new_stock: i32,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub term: String,
}

/// List products with optional search and active filters.
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("search" = Option<String>, Query, description = "Match against name, code or barcode"),
        ("is_active" = Option<bool>, Query, description = "Filter by active flag"),
        ("branch_id" = Option<Uuid>, Query, description = "Only products with stock at this branch"),
        ("limit" = Option<u64>, Query, description = "Page size (max 100)"),
        ("offset" = Option<u64>, Query, description = "Page offset"),
    ),
    responses(
        (status = 200, description = "Product list returned"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filters): Query<ProductFilters>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.catalog.list(filters).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// Active products only.
#[utoipa::path(
    get,
    path = "/api/v1/products/active",
    responses((status = 200, description = "Active products returned")),
    tag = "products"
)]
pub async fn list_active(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.catalog.list_active().await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Catalog statistics for the dashboard.
#[utoipa::path(
    get,
    path = "/api/v1/products/stats",
    responses((status = 200, description = "Catalog stats returned")),
    tag = "products"
)]
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let stats = state.catalog.get_stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Products at or below their reorder threshold.
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    responses((status = 200, description = "Low stock report returned")),
    tag = "products"
)]
pub async fn get_low_stock(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.low_stock.report().await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Search products and variants in one pass.
#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    params(SearchQuery),
    responses((status = 200, description = "Search results returned")),
    tag = "products"
)]
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.catalog.search_with_variants(&query.term).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Get a product by id.
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.catalog.get(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Scanner lookup by product or variant barcode.
#[utoipa::path(
    get,
    path = "/api/v1/products/barcode/{barcode}",
    params(("barcode" = String, Path, description = "Product or variant barcode")),
    responses(
        (status = 200, description = "Product returned"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_by_barcode(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.catalog.get_by_barcode(&barcode).await?;
    Ok(Json(ApiResponse::success(product)))
}

/// Create a product.
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate code or barcode", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = state.catalog.create(input, user.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(json!({ "id": id }))),
    ))
}

/// Create a product together with its color/size variants.
#[utoipa::path(
    post,
    path = "/api/v1/products/with-variants",
    request_body = CreateWithVariantsInput,
    responses(
        (status = 201, description = "Product and variants created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_with_variants(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateWithVariantsInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state.catalog.create_with_variants(input, user.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}

/// Update a product; stock bounds propagate to every branch row.
#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = state.catalog.update(id, input).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id }))))
}

/// Set a product's total stock; the delta lands on the default branch and a
/// movement is recorded.
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/adjust-stock",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let result = state
        .catalog
        .adjust_stock(
            id,
            request.new_stock,
            request.reason,
            request.notes,
            user.into(),
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Permanently delete a product not referenced by any sale.
#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 400, description = "Referenced by a sale", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = state.catalog.remove(id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted_id": id }))))
}

/// Back-fill zeroed branch rows for products missing them. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/products/sync-branch-stock",
    responses((status = 200, description = "Sync report returned")),
    tag = "products"
)]
pub async fn sync_branch_stock(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.catalog.sync_branch_stock().await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Group products by (category, price, fabric, embellishments) and label each
/// group's stock location BOX-n. Idempotent and deterministic.
#[utoipa::path(
    post,
    path = "/api/v1/products/assign-box-numbers",
    responses((status = 200, description = "Assignment report returned")),
    tag = "products"
)]
pub async fn assign_box_numbers(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.catalog.auto_assign_box_numbers().await?;
    Ok(Json(ApiResponse::success(report)))
}
