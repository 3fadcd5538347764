use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use stockroom_api::branches::BranchDirectory;
use stockroom_api::config::{AppConfig, BranchConfig};
use stockroom_api::db::{self, DbConfig, DbPool};
use stockroom_api::events::{process_events, EventSender};
use stockroom_api::services::low_stock::LowStockService;
use stockroom_api::services::product_catalog::{
    Actor, CreateProductInput, ProductCatalogService,
};
use stockroom_api::services::stock_ledger::StockLedgerService;
use stockroom_api::services::stock_transfers::StockTransferService;

pub struct TestContext {
    pub db: Arc<DbPool>,
    pub catalog: ProductCatalogService,
    pub transfers: StockTransferService,
    pub ledger: StockLedgerService,
    pub low_stock: LowStockService,
    pub branches: BranchDirectory,
    pub main_branch: Uuid,
    pub second_branch: Uuid,
}

/// Connects to a fresh in-memory SQLite database (single connection, so every
/// service call sees the same database), runs the migrator, and wires the
/// services the way `main` does.
pub async fn setup() -> TestContext {
    let db_cfg = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        connect_timeout: Duration::from_secs(5),
        acquire_timeout: Duration::from_secs(60),
    };
    let pool = db::establish_connection_with_config(&db_cfg)
        .await
        .expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let main_branch = Uuid::new_v4();
    let second_branch = Uuid::new_v4();
    let cfg = AppConfig {
        database_url: db_cfg.url.clone(),
        jwt_secret: "integration_test_secret_that_is_at_least_sixty_four_characters_long_ok"
            .to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 5,
        db_acquire_timeout_secs: 60,
        event_channel_capacity: 64,
        branches: vec![
            BranchConfig {
                id: main_branch,
                name: "Main".to_string(),
            },
            BranchConfig {
                id: second_branch,
                name: "Branch2".to_string(),
            },
        ],
        default_branch_id: main_branch,
    };

    let branches = BranchDirectory::from_config(&cfg);

    let (tx, rx) = mpsc::channel(64);
    let sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let db = Arc::new(pool);

    TestContext {
        catalog: ProductCatalogService::new(db.clone(), sender.clone(), branches.clone()),
        transfers: StockTransferService::new(db.clone(), sender.clone(), branches.clone()),
        ledger: StockLedgerService::new(db.clone()),
        low_stock: LowStockService::new(db.clone()),
        branches,
        db,
        main_branch,
        second_branch,
    }
}

pub fn actor() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        name: "Test Clerk".to_string(),
    }
}

/// A minimal valid product input; tweak fields per test.
pub fn product_input(name: &str, stock: i32) -> CreateProductInput {
    CreateProductInput {
        product_code: None,
        barcode: None,
        name: name.to_string(),
        brand: "Aziza".to_string(),
        model_name: None,
        fabric: "silk".to_string(),
        color: "Red".to_string(),
        sizes: "S,M,L".to_string(),
        style: None,
        occasion: None,
        embellishments: None,
        category_id: None,
        cost_price: rust_decimal_macros::dec!(450),
        selling_price: rust_decimal_macros::dec!(900),
        current_stock: stock,
        min_stock_level: 2,
        max_stock_level: 50,
        stock_location: None,
        description: None,
    }
}
