pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_products_table;
mod m20250301_000002_create_product_variants_table;
mod m20250301_000003_create_branch_stock_table;
mod m20250301_000004_create_stock_movements_table;
mod m20250301_000005_create_stock_transfers_table;
mod m20250301_000006_create_sale_items_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_products_table::Migration),
            Box::new(m20250301_000002_create_product_variants_table::Migration),
            Box::new(m20250301_000003_create_branch_stock_table::Migration),
            Box::new(m20250301_000004_create_stock_movements_table::Migration),
            Box::new(m20250301_000005_create_stock_transfers_table::Migration),
            Box::new(m20250301_000006_create_sale_items_table::Migration),
        ]
    }
}
