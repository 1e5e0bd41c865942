use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "item")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub collection_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub stac_version: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub stac_extensions: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub geometry: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub bbox: Option<Json>,
    #[sea_orm(column_type = "JsonBinary")]
    pub properties: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub assets: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub links: Option<Json>,
    pub datetime: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "Double", nullable)]
    pub bbox_xmin: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub bbox_ymin: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub bbox_xmax: Option<f64>,
    #[sea_orm(column_type = "Double", nullable)]
    pub bbox_ymax: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collection::Entity",
        from = "Column::CollectionId",
        to = "super::collection::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Collection,
}

impl Related<super::collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
