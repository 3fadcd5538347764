use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::sale_item::{self, Entity as SaleItems};
use crate::errors::ServiceError;

/// Counts sale line items referencing a product. The sales ledger is owned by
/// the point-of-sale system; this service only reads it, and only to decide
/// whether a product may be deleted.
pub async fn sale_reference_count<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<u64, ServiceError> {
    SaleItems::find()
        .filter(sale_item::Column::ProductId.eq(product_id))
        .count(conn)
        .await
        .map_err(Into::into)
}
