pub mod low_stock;
pub mod product_catalog;
pub mod sales_guard;
pub mod stock_ledger;
pub mod stock_transfers;
