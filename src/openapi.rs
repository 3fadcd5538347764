use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities;
use crate::handlers;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::products::list_products,
        handlers::products::list_active,
        handlers::products::get_stats,
        handlers::products::get_low_stock,
        handlers::products::search,
        handlers::products::get_product,
        handlers::products::get_by_barcode,
        handlers::products::create_product,
        handlers::products::create_with_variants,
        handlers::products::update_product,
        handlers::products::adjust_stock,
        handlers::products::delete_product,
        handlers::products::sync_branch_stock,
        handlers::products::assign_box_numbers,
        handlers::stock::get_movements,
        handlers::stock::list_branches,
        handlers::transfers::list_transfers,
        handlers::transfers::get_transfer,
        handlers::transfers::create_transfer,
        handlers::transfers::approve_transfer,
        handlers::transfers::ship_transfer,
        handlers::transfers::receive_transfer,
        handlers::transfers::cancel_transfer,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        entities::product::Model,
        entities::product_variant::Model,
        entities::branch_stock::Model,
        entities::stock_movement::Model,
        entities::stock_movement::MovementType,
        entities::stock_transfer::Model,
        entities::stock_transfer::TransferStatus,
        entities::stock_transfer_item::Model,
        services::product_catalog::CreateProductInput,
        services::product_catalog::UpdateProductInput,
        services::product_catalog::CreateWithVariantsInput,
        services::product_catalog::VariantInput,
        services::product_catalog::ProductResponse,
        services::product_catalog::BranchStockEntry,
        services::product_catalog::CatalogStats,
        services::stock_transfers::CreateTransferInput,
        services::stock_transfers::TransferItemInput,
        services::stock_transfers::TransferResponse,
        handlers::products::AdjustStockRequest,
        handlers::transfers::CancelTransferRequest,
    )),
    tags(
        (name = "products", description = "Catalog and per-branch stock"),
        (name = "stock", description = "Movement ledger and branch directory"),
        (name = "transfers", description = "Branch-to-branch stock transfers"),
    ),
    info(
        title = "stockroom-api",
        description = "Retail back-office service for multi-branch inventory"
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
