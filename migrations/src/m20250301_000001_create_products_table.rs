use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Products::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::ProductCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Products::Barcode).string_len(64).not_null())
                    .col(ColumnDef::new(Products::Name).string().not_null())
                    .col(ColumnDef::new(Products::Brand).string().not_null())
                    .col(ColumnDef::new(Products::ModelName).string().null())
                    .col(ColumnDef::new(Products::Fabric).string().not_null())
                    .col(ColumnDef::new(Products::Color).string().not_null())
                    .col(ColumnDef::new(Products::Sizes).string().not_null())
                    .col(ColumnDef::new(Products::Style).string().null())
                    .col(ColumnDef::new(Products::Occasion).string().null())
                    .col(ColumnDef::new(Products::Embellishments).string().null())
                    .col(ColumnDef::new(Products::CategoryId).uuid().null())
                    .col(
                        ColumnDef::new(Products::CostPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::SellingPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::MinStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::MaxStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Products::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Products::StockLocation).string().null())
                    .col(ColumnDef::new(Products::Description).text().null())
                    .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Products::UpdatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // First committer wins on codes and barcodes; the service layer maps
        // constraint violations to a conflict error.
        manager
            .create_index(
                Index::create()
                    .name("idx_products_product_code_unique")
                    .table(Products::Table)
                    .col(Products::ProductCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_products_barcode_unique")
                    .table(Products::Table)
                    .col(Products::Barcode)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    ProductCode,
    Barcode,
    Name,
    Brand,
    ModelName,
    Fabric,
    Color,
    Sizes,
    Style,
    Occasion,
    Embellishments,
    CategoryId,
    CostPrice,
    SellingPrice,
    MinStockLevel,
    MaxStockLevel,
    IsActive,
    StockLocation,
    Description,
    CreatedAt,
    UpdatedAt,
}
