use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collection::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Collection::Id)
                            .string_len(1024)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Collection::StacVersion).string().not_null())
                    .col(ColumnDef::new(Collection::StacExtensions).json_binary())
                    .col(ColumnDef::new(Collection::Title).string())
                    .col(ColumnDef::new(Collection::Description).text().not_null())
                    .col(ColumnDef::new(Collection::Keywords).json_binary())
                    .col(ColumnDef::new(Collection::License).string().not_null())
                    .col(ColumnDef::new(Collection::Providers).json_binary())
                    .col(ColumnDef::new(Collection::Summaries).json_binary())
                    .col(ColumnDef::new(Collection::Extent).json_binary().not_null())
                    .col(ColumnDef::new(Collection::Links).json_binary())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Collection::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Collection {
    Table,
    Id,
    StacVersion,
    StacExtensions,
    Title,
    Description,
    Keywords,
    License,
    Providers,
    Summaries,
    Extent,
    Links,
}
