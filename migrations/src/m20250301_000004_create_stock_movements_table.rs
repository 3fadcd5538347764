use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only ledger; no code path updates or deletes these rows.
        manager
            .create_table(
                Table::create()
                    .table(StockMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockMovements::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMovements::ProductName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::BranchId).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMovements::BranchName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::MovementType)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::Quantity).integer().not_null())
                    .col(ColumnDef::new(StockMovements::Reason).string().not_null())
                    .col(ColumnDef::new(StockMovements::Notes).text().null())
                    .col(
                        ColumnDef::new(StockMovements::PreviousStock)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::NewStock)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockMovements::RecordedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(StockMovements::RecordedByName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockMovements::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_movements_product_created")
                    .table(StockMovements::Table)
                    .col(StockMovements::ProductId)
                    .col(StockMovements::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockMovements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockMovements {
    Table,
    Id,
    ProductId,
    ProductName,
    BranchId,
    BranchName,
    MovementType,
    Quantity,
    Reason,
    Notes,
    PreviousStock,
    NewStock,
    RecordedBy,
    RecordedByName,
    CreatedAt,
}
