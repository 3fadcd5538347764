pub mod products;
pub mod stock;
pub mod transfers;
