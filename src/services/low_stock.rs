use sea_orm::EntityTrait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    branch_stock::Entity as BranchStockRows, product::Entity as Products,
};
use crate::errors::ServiceError;

/// A product at or below its reorder threshold.
#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockProduct {
    pub product_id: Uuid,
    pub product_code: String,
    pub name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
}

/// A single branch row that breached its own threshold, independent of the
/// product-level aggregate.
#[derive(Debug, Serialize, ToSchema)]
pub struct BranchBreach {
    pub product_id: Uuid,
    pub product_name: String,
    pub branch_id: Uuid,
    pub branch_name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LowStockReport {
    pub out_of_stock: Vec<LowStockProduct>,
    pub low_stock: Vec<LowStockProduct>,
    pub branch_breaches: Vec<BranchBreach>,
}

/// Stateless derived view over catalog state: out of stock means a zero
/// aggregate, low stock means a positive aggregate at or below the product's
/// minimum. Recomputed from the catalog on every read; holds no data of its
/// own.
#[derive(Clone)]
pub struct LowStockService {
    db: Arc<DbPool>,
}

impl LowStockService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn report(&self) -> Result<LowStockReport, ServiceError> {
        let products = Products::find().all(&*self.db).await?;
        let rows = BranchStockRows::find().all(&*self.db).await?;

        let mut aggregates: HashMap<Uuid, i32> = HashMap::new();
        for row in &rows {
            *aggregates.entry(row.product_id).or_insert(0) += row.current_stock;
        }

        let names: HashMap<Uuid, &str> = products
            .iter()
            .map(|p| (p.id, p.name.as_str()))
            .collect();

        let mut out_of_stock = Vec::new();
        let mut low_stock = Vec::new();

        for product in &products {
            let aggregate = aggregates.get(&product.id).copied().unwrap_or(0);
            let entry = LowStockProduct {
                product_id: product.id,
                product_code: product.product_code.clone(),
                name: product.name.clone(),
                current_stock: aggregate,
                min_stock_level: product.min_stock_level,
            };

            if aggregate == 0 {
                out_of_stock.push(entry);
            } else if aggregate <= product.min_stock_level {
                low_stock.push(entry);
            }
        }

        let branch_breaches = rows
            .iter()
            .filter(|row| row.is_out_of_stock() || row.is_low_stock())
            .map(|row| BranchBreach {
                product_id: row.product_id,
                product_name: names
                    .get(&row.product_id)
                    .map(|n| n.to_string())
                    .unwrap_or_default(),
                branch_id: row.branch_id,
                branch_name: row.branch_name.clone(),
                current_stock: row.current_stock,
                min_stock_level: row.min_stock_level,
            })
            .collect();

        Ok(LowStockReport {
            out_of_stock,
            low_stock,
            branch_breaches,
        })
    }
}
