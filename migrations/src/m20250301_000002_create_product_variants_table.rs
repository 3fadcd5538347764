use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductVariants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductVariants::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductVariants::Color).string().not_null())
                    .col(ColumnDef::new(ProductVariants::Sizes).string().not_null())
                    .col(
                        ColumnDef::new(ProductVariants::VariantCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::VariantBarcode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::CurrentStock)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::MinStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::MaxStockLevel)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::Price)
                            .decimal_len(12, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProductVariants::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_variants_barcode_unique")
                    .table(ProductVariants::Table)
                    .col(ProductVariants::VariantBarcode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_product_variants_product_id")
                    .table(ProductVariants::Table)
                    .col(ProductVariants::ProductId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProductVariants {
    Table,
    Id,
    ProductId,
    Color,
    Sizes,
    VariantCode,
    VariantBarcode,
    CurrentStock,
    MinStockLevel,
    MaxStockLevel,
    Price,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
