use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::stock_movement::{self, Entity as StockMovements, MovementType};
use crate::errors::ServiceError;

const DEFAULT_QUERY_LIMIT: u64 = 50;
const MAX_QUERY_LIMIT: u64 = 200;

/// A movement about to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: Uuid,
    pub product_name: String,
    pub branch_id: Uuid,
    pub branch_name: String,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub recorded_by: Uuid,
    pub recorded_by_name: String,
}

/// Appends one ledger entry. Takes the open transaction of the stock
/// mutation it documents; there is no append path outside a transaction, so
/// the ledger and the stock counts commit or fail together.
pub async fn record_movement(
    txn: &DatabaseTransaction,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    debug_assert!(movement.quantity > 0);

    let row = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(movement.product_id),
        product_name: Set(movement.product_name),
        branch_id: Set(movement.branch_id),
        branch_name: Set(movement.branch_name),
        movement_type: Set(movement.movement_type),
        quantity: Set(movement.quantity),
        reason: Set(movement.reason),
        notes: Set(movement.notes),
        previous_stock: Set(movement.previous_stock),
        new_stock: Set(movement.new_stock),
        recorded_by: Set(movement.recorded_by),
        recorded_by_name: Set(movement.recorded_by_name),
        created_at: Set(Utc::now()),
    };

    row.insert(txn).await.map_err(ServiceError::DatabaseError)
}

/// Read side of the movement ledger.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DbPool>,
}

impl StockLedgerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Returns the most recent movements, newest first, optionally filtered
    /// by product.
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        product_id: Option<Uuid>,
        limit: Option<u64>,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT);

        let mut query = StockMovements::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(limit);

        if let Some(product_id) = product_id {
            query = query.filter(stock_movement::Column::ProductId.eq(product_id));
        }

        query.all(&*self.db).await.map_err(Into::into)
    }
}
