use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per (product, branch); these rows are the only stored stock
        // counts, aggregates are always summed from them.
        manager
            .create_table(
                Table::create()
                    .table(BranchStock::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BranchStock::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BranchStock::ProductId).uuid().not_null())
                    .col(ColumnDef::new(BranchStock::BranchId).uuid().not_null())
                    .col(ColumnDef::new(BranchStock::BranchName).string().not_null())
                    .col(
                        ColumnDef::new(BranchStock::CurrentStock)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchStock::MinStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BranchStock::MaxStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BranchStock::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_branch_stock_product_branch_unique")
                    .table(BranchStock::Table)
                    .col(BranchStock::ProductId)
                    .col(BranchStock::BranchId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BranchStock::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BranchStock {
    Table,
    Id,
    ProductId,
    BranchId,
    BranchName,
    CurrentStock,
    MinStockLevel,
    MaxStockLevel,
    UpdatedAt,
}
