use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::fmt;

/// Direction of a stock movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    #[sea_orm(string_value = "in")]
    In,
    #[sea_orm(string_value = "out")]
    Out,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementType::In => write!(f, "in"),
            MovementType::Out => write!(f, "out"),
        }
    }
}

/// One immutable ledger entry recording an in/out stock change with
/// before/after quantities, reason, and acting user. Rows are only ever
/// inserted, inside the same transaction as the stock change they document.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub branch_id: Uuid,
    pub branch_name: String,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// Branch-level stock before this movement
    pub previous_stock: i32,
    /// Branch-level stock after this movement
    pub new_stock: i32,
    pub recorded_by: Uuid,
    pub recorded_by_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
