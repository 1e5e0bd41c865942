use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_item_datetime")
                    .table(Item::Table)
                    .col(Item::Datetime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_item_datetime")
                    .table(Item::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Item {
    Table,
    Datetime,
}
