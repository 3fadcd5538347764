use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Owned by the point-of-sale system; this service only reads it to
        // block deletion of products referenced by a sale.
        manager
            .create_table(
                Table::create()
                    .table(SaleItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SaleItems::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(SaleItems::SaleId).uuid().not_null())
                    .col(ColumnDef::new(SaleItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(SaleItems::UnitPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(SaleItems::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sale_items_product_id")
                    .table(SaleItems::Table)
                    .col(SaleItems::ProductId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SaleItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SaleItems {
    Table,
    Id,
    SaleId,
    ProductId,
    Quantity,
    UnitPrice,
    CreatedAt,
}
