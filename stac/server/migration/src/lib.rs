pub use sea_orm_migration::prelude::*;

mod m20250801_000001_create_collection_table;
mod m20250801_000002_create_item_table;
mod m20250801_000003_add_item_datetime_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250801_000001_create_collection_table::Migration),
            Box::new(m20250801_000002_create_item_table::Migration),
            Box::new(m20250801_000003_add_item_datetime_index::Migration),
        ]
    }
}
