#![allow(dead_code)] // each test binary uses a different subset

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use serde_json::{Value, json};
use stac_server::stac;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};

pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

pub async fn setup_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let db_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn collection_json(id: &str) -> Value {
    json!({
        "type": "Collection",
        "stac_version": "1.0.0",
        "id": id,
        "title": format!("{} scenes", id),
        "description": "Test imagery",
        "license": "proprietary",
        "keywords": ["test"],
        "extent": {
            "spatial": {"bbox": [[-180.0, -90.0, 180.0, 90.0]]},
            "temporal": {"interval": [["2020-01-01T00:00:00Z", null]]}
        },
        "links": []
    })
}

pub fn collection_document(id: &str) -> stac::Collection {
    serde_json::from_value(collection_json(id)).expect("valid collection fixture")
}

/// An item covering `bbox` at `datetime`.
pub fn item_json(collection_id: &str, id: &str, datetime: &str, bbox: [f64; 4]) -> Value {
    let [xmin, ymin, xmax, ymax] = bbox;
    json!({
        "type": "Feature",
        "stac_version": "1.0.0",
        "id": id,
        "collection": collection_id,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[xmin, ymin], [xmax, ymin], [xmax, ymax], [xmin, ymax], [xmin, ymin]]]
        },
        "bbox": [xmin, ymin, xmax, ymax],
        "properties": {"datetime": datetime},
        "links": [],
        "assets": {
            "visual": {"href": format!("https://data.example.com/{}.tif", id)}
        }
    })
}

pub fn item_document(collection_id: &str, id: &str, datetime: &str, bbox: [f64; 4]) -> stac::Item {
    serde_json::from_value(item_json(collection_id, id, datetime, bbox)).expect("valid item fixture")
}
