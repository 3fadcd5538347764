use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Product entity for the catalog.
///
/// Stock is not stored here: the per-branch rows in `branch_stock` are the
/// single source of truth and every aggregate the API reports is summed from
/// them inside the query or transaction that needs it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_code: String,
    pub barcode: String,
    pub name: String,
    pub brand: String,
    pub model_name: Option<String>,
    pub fabric: String,
    pub color: String,
    /// Comma-separated size list, e.g. "S,M,L"
    pub sizes: String,
    pub style: Option<String>,
    pub occasion: Option<String>,
    pub embellishments: Option<String>,
    pub category_id: Option<Uuid>,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub is_active: bool,
    pub stock_location: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_variant::Entity")]
    ProductVariants,
    #[sea_orm(has_many = "super::branch_stock::Entity")]
    BranchStock,
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariants.def()
    }
}

impl Related<super::branch_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BranchStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
