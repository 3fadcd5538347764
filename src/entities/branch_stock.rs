use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Per-(product, branch) stock row. These rows are the only stored stock
/// counts; the product-level aggregate is always derived from them.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "branch_stock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub branch_name: String,
    pub current_stock: i32,
    pub min_stock_level: i32,
    pub max_stock_level: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock == 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock > 0 && self.current_stock <= self.min_stock_level
    }
}
