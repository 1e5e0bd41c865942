use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Item::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Item::CollectionId).string_len(1024).not_null())
                    .col(ColumnDef::new(Item::Id).string_len(1024).not_null())
                    .col(ColumnDef::new(Item::StacVersion).string().not_null())
                    .col(ColumnDef::new(Item::StacExtensions).json_binary())
                    .col(ColumnDef::new(Item::Geometry).json_binary())
                    .col(ColumnDef::new(Item::Bbox).json_binary())
                    .col(ColumnDef::new(Item::Properties).json_binary().not_null())
                    .col(ColumnDef::new(Item::Assets).json_binary().not_null())
                    .col(ColumnDef::new(Item::Links).json_binary())
                    .col(ColumnDef::new(Item::Datetime).timestamp_with_time_zone())
                    .col(ColumnDef::new(Item::BboxXmin).double())
                    .col(ColumnDef::new(Item::BboxYmin).double())
                    .col(ColumnDef::new(Item::BboxXmax).double())
                    .col(ColumnDef::new(Item::BboxYmax).double())
                    .primary_key(Index::create().col(Item::CollectionId).col(Item::Id))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_item_collection_id")
                            .from(Item::Table, Item::CollectionId)
                            .to(Collection::Table, Collection::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Item::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Collection {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Item {
    Table,
    CollectionId,
    Id,
    StacVersion,
    StacExtensions,
    Geometry,
    Bbox,
    Properties,
    Assets,
    Links,
    Datetime,
    BboxXmin,
    BboxYmin,
    BboxXmax,
    BboxYmax,
}
