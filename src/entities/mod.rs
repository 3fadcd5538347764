pub mod branch_stock;
pub mod product;
pub mod product_variant;
pub mod sale_item;
pub mod stock_movement;
pub mod stock_transfer;
pub mod stock_transfer_item;

pub use branch_stock::Entity as BranchStock;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use sale_item::Entity as SaleItem;
pub use stock_movement::Entity as StockMovement;
pub use stock_transfer::Entity as StockTransfer;
pub use stock_transfer_item::Entity as StockTransferItem;
