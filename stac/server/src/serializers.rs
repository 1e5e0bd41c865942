//! Conversions between database rows and STAC documents.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use sea_orm::ActiveValue;
use serde_json::{Map, Value};

use crate::entities::{collection, item};
use crate::links::{CollectionLinks, INFERRED_LINK_RELS, ItemLinks, resolve_links};
use crate::stac::{self, InvalidDocument, Link, Validate};

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The document breaks a STAC structural rule.
    #[error(transparent)]
    Invalid(#[from] InvalidDocument),
    /// An item was submitted without naming its collection.
    #[error("Item {0} does not name a collection")]
    MissingCollection(String),
    /// A datetime property is not RFC 3339.
    #[error("Invalid datetime '{0}': {1}")]
    InvalidDatetime(String, chrono::ParseError),
    /// A stored JSON column does not have the expected shape.
    #[error("Stored document is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Defines the conversions between a table row and its STAC document.
pub trait Serializer {
    type Model;
    type ActiveModel;
    type Document;

    fn db_to_stac(model: Self::Model, base_url: &str) -> Result<Self::Document, SerializeError>;

    fn stac_to_db(document: Self::Document) -> Result<Self::ActiveModel, SerializeError>;
}

pub struct ItemSerializer;

pub struct CollectionSerializer;

impl Serializer for ItemSerializer {
    type Model = item::Model;
    type ActiveModel = item::ActiveModel;
    type Document = stac::Item;

    fn db_to_stac(model: item::Model, base_url: &str) -> Result<stac::Item, SerializeError> {
        let mut properties = match model.properties {
            Value::Object(properties) => properties,
            other => serde_json::from_value::<Map<String, Value>>(other)?,
        };
        let has_datetime = matches!(properties.get("datetime"), Some(Value::String(_)));
        if let (Some(datetime), true) = (model.datetime, has_datetime) {
            properties.insert(
                "datetime".to_string(),
                Value::String(format_datetime(&datetime)),
            );
        }

        let mut links = ItemLinks {
            collection_id: &model.collection_id,
            item_id: &model.id,
            base_url,
        }
        .create_links();
        links.extend(resolve_links(stored_links(model.links)?, base_url));

        Ok(stac::Item {
            r#type: "Feature".to_string(),
            stac_version: model.stac_version,
            stac_extensions: optional_json(model.stac_extensions)?,
            id: model.id,
            collection: Some(model.collection_id),
            geometry: model.geometry.filter(|g| !g.is_null()),
            bbox: model.bbox.map(serde_json::from_value).transpose()?,
            properties,
            links,
            assets: optional_json(Some(model.assets))?,
        })
    }

    fn stac_to_db(document: stac::Item) -> Result<item::ActiveModel, SerializeError> {
        item_to_active_model(document, Utc::now())
    }
}

/// Builds the row for an item, stamping `created` and `updated` with `now`.
pub fn item_to_active_model(
    mut document: stac::Item,
    now: DateTime<Utc>,
) -> Result<item::ActiveModel, SerializeError> {
    document.validate()?;
    let collection_id = document
        .collection
        .clone()
        .ok_or_else(|| SerializeError::MissingCollection(document.id.clone()))?;

    let datetime = indexed_datetime(&document.properties)?;
    let stamp = Value::String(format_datetime(&now.fixed_offset()));
    document
        .properties
        .entry("created")
        .or_insert_with(|| stamp.clone());
    document.properties.insert("updated".to_string(), stamp);

    let extent = document.bbox.as_deref().map(bbox_extent);
    let links = stored_links_to_json(document.links)?;

    Ok(item::ActiveModel {
        collection_id: ActiveValue::Set(collection_id),
        id: ActiveValue::Set(document.id),
        stac_version: ActiveValue::Set(document.stac_version),
        stac_extensions: ActiveValue::Set(strings_to_json(document.stac_extensions)),
        geometry: ActiveValue::Set(document.geometry),
        bbox: ActiveValue::Set(document.bbox.map(serde_json::to_value).transpose()?),
        properties: ActiveValue::Set(Value::Object(document.properties)),
        assets: ActiveValue::Set(Value::Object(document.assets)),
        links: ActiveValue::Set(links),
        datetime: ActiveValue::Set(datetime),
        bbox_xmin: ActiveValue::Set(extent.map(|e| e[0])),
        bbox_ymin: ActiveValue::Set(extent.map(|e| e[1])),
        bbox_xmax: ActiveValue::Set(extent.map(|e| e[2])),
        bbox_ymax: ActiveValue::Set(extent.map(|e| e[3])),
    })
}

impl Serializer for CollectionSerializer {
    type Model = collection::Model;
    type ActiveModel = collection::ActiveModel;
    type Document = stac::Collection;

    fn db_to_stac(
        model: collection::Model,
        base_url: &str,
    ) -> Result<stac::Collection, SerializeError> {
        let mut links = CollectionLinks {
            collection_id: &model.id,
            base_url,
        }
        .create_links();
        links.extend(resolve_links(stored_links(model.links)?, base_url));

        Ok(stac::Collection {
            r#type: "Collection".to_string(),
            stac_version: model.stac_version,
            stac_extensions: optional_json(model.stac_extensions)?,
            id: model.id,
            title: model.title,
            description: model.description,
            keywords: optional_json(model.keywords)?,
            license: model.license,
            providers: optional_json(model.providers)?,
            extent: serde_json::from_value(model.extent)?,
            summaries: optional_json(model.summaries)?,
            links,
        })
    }

    fn stac_to_db(document: stac::Collection) -> Result<collection::ActiveModel, SerializeError> {
        document.validate()?;
        let providers = if document.providers.is_empty() {
            None
        } else {
            Some(Value::Array(document.providers))
        };
        let summaries = if document.summaries.is_empty() {
            None
        } else {
            Some(Value::Object(document.summaries))
        };

        Ok(collection::ActiveModel {
            id: ActiveValue::Set(document.id),
            stac_version: ActiveValue::Set(document.stac_version),
            stac_extensions: ActiveValue::Set(strings_to_json(document.stac_extensions)),
            title: ActiveValue::Set(document.title),
            description: ActiveValue::Set(document.description),
            keywords: ActiveValue::Set(strings_to_json(document.keywords)),
            license: ActiveValue::Set(document.license),
            providers: ActiveValue::Set(providers),
            summaries: ActiveValue::Set(summaries),
            extent: ActiveValue::Set(serde_json::to_value(&document.extent)?),
            links: ActiveValue::Set(stored_links_to_json(document.links)?),
        })
    }
}

/// Formats a timestamp the way STAC documents carry it, e.g. `2020-01-01T00:00:00Z`.
pub fn format_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_datetime(value: &str) -> Result<DateTime<FixedOffset>, SerializeError> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| SerializeError::InvalidDatetime(value.to_string(), e))
}

/// The value stored in the `datetime` column: `datetime`, or `start_datetime` for ranges.
fn indexed_datetime(
    properties: &Map<String, Value>,
) -> Result<Option<DateTime<FixedOffset>>, SerializeError> {
    let value = match properties.get("datetime") {
        Some(Value::String(datetime)) => Some(datetime),
        _ => match properties.get("start_datetime") {
            Some(Value::String(start)) => Some(start),
            _ => None,
        },
    };
    value.map(|v| parse_datetime(v)).transpose()
}

/// The 2D extent `[xmin, ymin, xmax, ymax]` of a 4 or 6 number bbox.
fn bbox_extent(bbox: &[f64]) -> [f64; 4] {
    if bbox.len() == 6 {
        [bbox[0], bbox[1], bbox[3], bbox[4]]
    } else {
        [bbox[0], bbox[1], bbox[2], bbox[3]]
    }
}

fn optional_json<T: serde::de::DeserializeOwned + Default>(
    value: Option<Value>,
) -> Result<T, SerializeError> {
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

fn stored_links(value: Option<Value>) -> Result<Vec<Link>, SerializeError> {
    optional_json(value)
}

fn stored_links_to_json(links: Vec<Link>) -> Result<Option<Value>, SerializeError> {
    let kept: Vec<Link> = links
        .into_iter()
        .filter(|link| !INFERRED_LINK_RELS.contains(&link.rel.as_str()))
        .collect();
    if kept.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_value(kept)?))
    }
}

fn strings_to_json(values: Vec<String>) -> Option<Value> {
    if values.is_empty() {
        None
    } else {
        Some(Value::Array(values.into_iter().map(Value::String).collect()))
    }
}
