use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockTransfers::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::TransferNumber)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::SourceBranchId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::SourceBranchName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::DestinationBranchId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::DestinationBranchName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransfers::RequestedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(StockTransfers::RequestedByName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransfers::ApprovedBy).uuid().null())
                    .col(ColumnDef::new(StockTransfers::ReceivedBy).uuid().null())
                    .col(ColumnDef::new(StockTransfers::Notes).text().null())
                    .col(
                        ColumnDef::new(StockTransfers::CancellationReason)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockTransfers::ApprovedAt).timestamp().null())
                    .col(ColumnDef::new(StockTransfers::ShippedAt).timestamp().null())
                    .col(
                        ColumnDef::new(StockTransfers::CompletedAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::CancelledAt)
                            .timestamp()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockTransfers::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_transfers_number_unique")
                    .table(StockTransfers::Table)
                    .col(StockTransfers::TransferNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StockTransferItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockTransferItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::TransferId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::ProductId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::ProductName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::UnitPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockTransferItems::StockAtRequest)
                            .integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_transfer_items_transfer_id")
                    .table(StockTransferItems::Table)
                    .col(StockTransferItems::TransferId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockTransferItems::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StockTransfers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StockTransfers {
    Table,
    Id,
    TransferNumber,
    SourceBranchId,
    SourceBranchName,
    DestinationBranchId,
    DestinationBranchName,
    Status,
    RequestedBy,
    RequestedByName,
    ApprovedBy,
    ReceivedBy,
    Notes,
    CancellationReason,
    CreatedAt,
    ApprovedAt,
    ShippedAt,
    CompletedAt,
    CancelledAt,
    Version,
}

#[derive(DeriveIden)]
enum StockTransferItems {
    Table,
    Id,
    TransferId,
    ProductId,
    ProductName,
    Quantity,
    UnitPrice,
    StockAtRequest,
}
