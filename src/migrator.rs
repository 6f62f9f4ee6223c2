use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_photos_table::Migration),
            Box::new(m20240301_000002_create_catalog_products_table::Migration),
            Box::new(m20240301_000003_create_photo_variants_table::Migration),
            Box::new(m20240301_000004_create_print_orders_table::Migration),
        ]
    }
}

mod m20240301_000001_create_photos_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_photos_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Photos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Photos::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Photos::Title).string().not_null())
                        .col(ColumnDef::new(Photos::Description).string().null())
                        .col(
                            ColumnDef::new(Photos::Price)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Photos::Tags).json().null())
                        .col(ColumnDef::new(Photos::ImagePath).string().not_null())
                        .col(ColumnDef::new(Photos::OwnerId).uuid().null())
                        .col(ColumnDef::new(Photos::Camera).string().null())
                        .col(ColumnDef::new(Photos::Location).string().null())
                        .col(ColumnDef::new(Photos::ShotAt).timestamp().null())
                        .col(ColumnDef::new(Photos::CreatedAt).timestamp().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Photos::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Photos {
        Table,
        Id,
        Title,
        Description,
        Price,
        Tags,
        ImagePath,
        OwnerId,
        Camera,
        Location,
        ShotAt,
        CreatedAt,
    }
}

mod m20240301_000002_create_catalog_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CatalogProducts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogProducts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogProducts::Sku).string().not_null())
                        .col(ColumnDef::new(CatalogProducts::Name).string().not_null())
                        .col(ColumnDef::new(CatalogProducts::Description).string().null())
                        .col(
                            ColumnDef::new(CatalogProducts::BasePrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CatalogProducts::Currency).string().not_null())
                        .col(
                            ColumnDef::new(CatalogProducts::DefaultSizing)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CatalogProducts::DefaultShippingMethod)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(CatalogProducts::ColorOptions).json().null())
                        .col(
                            ColumnDef::new(CatalogProducts::ProviderDetails)
                                .json()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(CatalogProducts::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogProducts::UpdatedAt)
                                .timestamp()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // SKU is globally unique
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_catalog_products_sku")
                        .table(CatalogProducts::Table)
                        .col(CatalogProducts::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CatalogProducts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum CatalogProducts {
        Table,
        Id,
        Sku,
        Name,
        Description,
        BasePrice,
        Currency,
        DefaultSizing,
        DefaultShippingMethod,
        ColorOptions,
        ProviderDetails,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_photo_variants_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_photo_variants_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PhotoVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PhotoVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PhotoVariants::PhotoId).uuid().not_null())
                        .col(
                            ColumnDef::new(PhotoVariants::CatalogProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PhotoVariants::Name).string().null())
                        .col(ColumnDef::new(PhotoVariants::Description).string().null())
                        .col(ColumnDef::new(PhotoVariants::RetailPrice).decimal().null())
                        .col(ColumnDef::new(PhotoVariants::Currency).string().null())
                        .col(
                            ColumnDef::new(PhotoVariants::ProfitMargin)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PhotoVariants::Sizing).string().null())
                        .col(ColumnDef::new(PhotoVariants::AssetUrl).string().null())
                        .col(ColumnDef::new(PhotoVariants::AssetDetails).json().null())
                        .col(ColumnDef::new(PhotoVariants::Mockups).json().null())
                        .col(ColumnDef::new(PhotoVariants::ColorOptions).json().null())
                        .col(
                            ColumnDef::new(PhotoVariants::ProviderAttributes)
                                .json()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PhotoVariants::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(PhotoVariants::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PhotoVariants::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_photo_variants_photo_id")
                        .table(PhotoVariants::Table)
                        .col(PhotoVariants::PhotoId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_photo_variants_catalog_product_id")
                        .table(PhotoVariants::Table)
                        .col(PhotoVariants::CatalogProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PhotoVariants::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum PhotoVariants {
        Table,
        Id,
        PhotoId,
        CatalogProductId,
        Name,
        Description,
        RetailPrice,
        Currency,
        ProfitMargin,
        Sizing,
        AssetUrl,
        AssetDetails,
        Mockups,
        ColorOptions,
        ProviderAttributes,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_print_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_print_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PrintOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PrintOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PrintOrders::MerchantReference)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PrintOrders::ProviderOrderId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PrintOrders::Outcome).string().null())
                        .col(ColumnDef::new(PrintOrders::ProviderStatus).string().null())
                        .col(ColumnDef::new(PrintOrders::PhotoId).uuid().not_null())
                        .col(ColumnDef::new(PrintOrders::VariantId).uuid().not_null())
                        .col(ColumnDef::new(PrintOrders::Sku).string().not_null())
                        .col(ColumnDef::new(PrintOrders::ColorCode).string().null())
                        .col(
                            ColumnDef::new(PrintOrders::Copies)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(PrintOrders::ShippingMethod)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PrintOrders::Recipient).json().not_null())
                        .col(ColumnDef::new(PrintOrders::Metadata).json().null())
                        .col(
                            ColumnDef::new(PrintOrders::ProviderResponse)
                                .json()
                                .null(),
                        )
                        .col(ColumnDef::new(PrintOrders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(PrintOrders::Pricing).json().not_null())
                        .col(
                            ColumnDef::new(PrintOrders::PaymentIntentId)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(PrintOrders::PaymentStatus).string().null())
                        .col(
                            ColumnDef::new(PrintOrders::CreatedAt)
                                .timestamp()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_print_orders_merchant_reference")
                        .table(PrintOrders::Table)
                        .col(PrintOrders::MerchantReference)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // One local record per payment; a concurrent duplicate insert
            // surfaces as a constraint violation which the fulfillment
            // service treats as "already placed".
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uidx_print_orders_payment_intent_id")
                        .table(PrintOrders::Table)
                        .col(PrintOrders::PaymentIntentId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_print_orders_created_at")
                        .table(PrintOrders::Table)
                        .col(PrintOrders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PrintOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum PrintOrders {
        Table,
        Id,
        MerchantReference,
        ProviderOrderId,
        Outcome,
        ProviderStatus,
        PhotoId,
        VariantId,
        Sku,
        ColorCode,
        Copies,
        ShippingMethod,
        Recipient,
        Metadata,
        ProviderResponse,
        CreatedBy,
        Pricing,
        PaymentIntentId,
        PaymentStatus,
        CreatedAt,
    }
}
