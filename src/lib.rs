//! stockroom-api library
//!
//! Retail back-office service whose core is multi-branch inventory
//! accounting: per-branch stock counts for products and variants, an
//! append-only movement ledger, and branch-to-branch transfers.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod branches;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod openapi;
pub mod services;

use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthKeys;
use crate::branches::BranchDirectory;
use crate::events::EventSender;
use crate::services::low_stock::LowStockService;
use crate::services::product_catalog::ProductCatalogService;
use crate::services::stock_ledger::StockLedgerService;
use crate::services::stock_transfers::StockTransferService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub branches: BranchDirectory,
    pub event_sender: EventSender,
    pub catalog: ProductCatalogService,
    pub ledger: StockLedgerService,
    pub transfers: StockTransferService,
    pub low_stock: LowStockService,
    pub auth_keys: AuthKeys,
}

impl AppState {
    /// Wires every service from the shared connection, event channel and
    /// branch directory.
    pub fn new(
        db: Arc<DatabaseConnection>,
        cfg: config::AppConfig,
        event_sender: EventSender,
    ) -> Self {
        let branches = BranchDirectory::from_config(&cfg);
        let auth_keys = AuthKeys::from_secret(&cfg.jwt_secret);

        Self {
            catalog: ProductCatalogService::new(
                db.clone(),
                event_sender.clone(),
                branches.clone(),
            ),
            ledger: StockLedgerService::new(db.clone()),
            transfers: StockTransferService::new(
                db.clone(),
                event_sender.clone(),
                branches.clone(),
            ),
            low_stock: LowStockService::new(db.clone()),
            db,
            config: cfg,
            branches,
            event_sender,
            auth_keys,
        }
    }
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> AuthKeys {
        state.auth_keys.clone()
    }
}

// Common response wrapper
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, errors::ServiceError>;

/// All `/api/v1` routes.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route("/products/active", get(handlers::products::list_active))
        .route("/products/stats", get(handlers::products::get_stats))
        .route("/products/low-stock", get(handlers::products::get_low_stock))
        .route("/products/search", get(handlers::products::search))
        .route(
            "/products/with-variants",
            post(handlers::products::create_with_variants),
        )
        .route(
            "/products/sync-branch-stock",
            post(handlers::products::sync_branch_stock),
        )
        .route(
            "/products/assign-box-numbers",
            post(handlers::products::assign_box_numbers),
        )
        .route(
            "/products/barcode/:barcode",
            get(handlers::products::get_by_barcode),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/products/:id/adjust-stock",
            post(handlers::products::adjust_stock),
        )
        .route("/stock/movements", get(handlers::stock::get_movements))
        .route("/branches", get(handlers::stock::list_branches))
        .route(
            "/transfers",
            get(handlers::transfers::list_transfers).post(handlers::transfers::create_transfer),
        )
        .route("/transfers/:id", get(handlers::transfers::get_transfer))
        .route(
            "/transfers/:id/approve",
            post(handlers::transfers::approve_transfer),
        )
        .route(
            "/transfers/:id/ship",
            post(handlers::transfers::ship_transfer),
        )
        .route(
            "/transfers/:id/receive",
            post(handlers::transfers::receive_transfer),
        )
        .route(
            "/transfers/:id/cancel",
            post(handlers::transfers::cancel_transfer),
        )
}
