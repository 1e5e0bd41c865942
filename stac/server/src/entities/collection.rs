use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collection")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub stac_version: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub stac_extensions: Option<Json>,
    pub title: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub keywords: Option<Json>,
    pub license: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub providers: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub summaries: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub extent: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub links: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::item::Entity")]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
