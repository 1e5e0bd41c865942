//! STAC documents as they travel over the API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

pub const MEDIA_TYPE_JSON: &str = "application/json";
pub const MEDIA_TYPE_GEOJSON: &str = "application/geo+json";
pub const MEDIA_TYPE_OPENAPI: &str = "application/vnd.oai.openapi+json;version=3.0";
pub const MEDIA_TYPE_HTML: &str = "text/html";

/// Conformance classes advertised by the landing page and `/conformance`.
pub const CONFORMANCE_CLASSES: [&str; 11] = [
    "https://api.stacspec.org/v1.0.0/core",
    "https://api.stacspec.org/v1.0.0/collections",
    "https://api.stacspec.org/v1.0.0/ogcapi-features",
    "https://api.stacspec.org/v1.0.0/ogcapi-features/extensions/transaction",
    "https://api.stacspec.org/v1.0.0/item-search",
    "https://api.stacspec.org/v1.0.0/item-search#sort",
    "https://api.stacspec.org/v1.0.0/item-search#fields",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/core",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/oas30",
    "http://www.opengis.net/spec/ogcapi-features-1/1.0/conf/geojson",
    "http://www.opengis.net/spec/ogcapi-features-4/1.0/conf/simpletx",
];

/// A document failed the STAC structural rules.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidDocument(pub String);

/// Structural checks every STAC document must pass.
pub trait Validate {
    fn validate(&self) -> Result<(), InvalidDocument>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// HTTP method for links that must be followed with something other than GET.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub body: Option<Value>,
}

impl Link {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            media_type: None,
            title: None,
            method: None,
            body: None,
        }
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn collection_type() -> String {
    "Collection".to_string()
}

/// A GeoJSON feature describing one spatiotemporal asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    #[serde(rename = "type", default = "feature_type")]
    pub r#type: String,
    pub stac_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[schema(value_type = Object)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub assets: Map<String, Value>,
}

impl Validate for Item {
    fn validate(&self) -> Result<(), InvalidDocument> {
        if self.id.trim().is_empty() {
            return Err(InvalidDocument("item id must not be empty".to_string()));
        }
        if self.r#type != "Feature" {
            return Err(InvalidDocument(format!(
                "item {} has type '{}', expected 'Feature'",
                self.id, self.r#type
            )));
        }
        if self.stac_version.is_empty() {
            return Err(InvalidDocument(format!(
                "item {} has no stac_version",
                self.id
            )));
        }
        if let Some(bbox) = &self.bbox {
            validate_bbox(bbox)?;
        }
        if let Some(geometry) = &self.geometry {
            if geometry.get("type").and_then(Value::as_str).is_none() {
                return Err(InvalidDocument(format!(
                    "item {} geometry has no type member",
                    self.id
                )));
            }
        }
        match self.properties.get("datetime") {
            Some(Value::String(_)) => Ok(()),
            Some(Value::Null) => {
                let has_range = ["start_datetime", "end_datetime"]
                    .iter()
                    .all(|key| matches!(self.properties.get(*key), Some(Value::String(_))));
                if has_range {
                    Ok(())
                } else {
                    Err(InvalidDocument(format!(
                        "item {} has a null datetime without start_datetime and end_datetime",
                        self.id
                    )))
                }
            }
            _ => Err(InvalidDocument(format!(
                "item {} has no properties.datetime",
                self.id
            ))),
        }
    }
}

fn validate_bbox(bbox: &[f64]) -> Result<(), InvalidDocument> {
    if bbox.len() == 4 || bbox.len() == 6 {
        Ok(())
    } else {
        Err(InvalidDocument(format!(
            "bbox must have 4 or 6 numbers, found {}",
            bbox.len()
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub r#type: String,
    pub features: Vec<Item>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(
        rename = "numberMatched",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub number_matched: Option<u64>,
    #[serde(
        rename = "numberReturned",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub number_returned: Option<u64>,
}

impl ItemCollection {
    pub fn new(features: Vec<Item>, links: Vec<Link>) -> Self {
        let number_returned = features.len() as u64;
        Self {
            r#type: feature_collection_type(),
            features,
            links,
            number_matched: None,
            number_returned: Some(number_returned),
        }
    }
}

impl Validate for ItemCollection {
    fn validate(&self) -> Result<(), InvalidDocument> {
        self.features.iter().try_for_each(Validate::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpatialExtent {
    pub bbox: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemporalExtent {
    pub interval: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

impl Extent {
    fn validate(&self) -> Result<(), InvalidDocument> {
        if self.spatial.bbox.is_empty() {
            return Err(InvalidDocument(
                "extent.spatial.bbox must contain at least one bbox".to_string(),
            ));
        }
        self.spatial
            .bbox
            .iter()
            .try_for_each(|bbox| validate_bbox(bbox))?;
        if self.temporal.interval.is_empty() {
            return Err(InvalidDocument(
                "extent.temporal.interval must contain at least one interval".to_string(),
            ));
        }
        if let Some(interval) = self.temporal.interval.iter().find(|i| i.len() != 2) {
            return Err(InvalidDocument(format!(
                "temporal intervals must have a start and an end, found {} values",
                interval.len()
            )));
        }
        Ok(())
    }
}

/// A set of items sharing license, provider and extent metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Collection {
    #[serde(rename = "type", default = "collection_type")]
    pub r#type: String,
    pub stac_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub providers: Vec<Value>,
    pub extent: Extent,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    #[schema(value_type = Object)]
    pub summaries: Map<String, Value>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Validate for Collection {
    fn validate(&self) -> Result<(), InvalidDocument> {
        if self.id.trim().is_empty() {
            return Err(InvalidDocument(
                "collection id must not be empty".to_string(),
            ));
        }
        if self.r#type != "Collection" {
            return Err(InvalidDocument(format!(
                "collection {} has type '{}', expected 'Collection'",
                self.id, self.r#type
            )));
        }
        if self.stac_version.is_empty() {
            return Err(InvalidDocument(format!(
                "collection {} has no stac_version",
                self.id
            )));
        }
        self.extent.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Collections {
    pub collections: Vec<Collection>,
    pub links: Vec<Link>,
}

impl Validate for Collections {
    fn validate(&self) -> Result<(), InvalidDocument> {
        self.collections.iter().try_for_each(Validate::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LandingPage {
    #[serde(rename = "type")]
    pub r#type: String,
    pub id: String,
    pub title: String,
    pub description: String,
    pub stac_version: String,
    #[serde(rename = "conformsTo")]
    pub conforms_to: Vec<String>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Conformance {
    #[serde(rename = "conformsTo")]
    pub conforms_to: Vec<String>,
}

impl Conformance {
    pub fn current() -> Self {
        Self {
            conforms_to: CONFORMANCE_CLASSES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_item() -> Item {
        serde_json::from_value(json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "scene-1",
            "geometry": {"type": "Point", "coordinates": [10.0, 20.0]},
            "bbox": [10.0, 20.0, 10.0, 20.0],
            "properties": {"datetime": "2020-01-01T00:00:00Z"},
            "assets": {}
        }))
        .unwrap()
    }

    fn sample_collection() -> Collection {
        serde_json::from_value(json!({
            "type": "Collection",
            "stac_version": "1.0.0",
            "id": "landsat",
            "description": "Landsat scenes",
            "license": "PDDL-1.0",
            "extent": {
                "spatial": {"bbox": [[-180.0, -90.0, 180.0, 90.0]]},
                "temporal": {"interval": [["2013-06-01T00:00:00Z", null]]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn can_accept_valid_item() {
        assert_eq!(sample_item().validate(), Ok(()));
    }

    #[test]
    fn rejects_item_with_wrong_type() {
        let mut item = sample_item();
        item.r#type = "FeatureCollection".to_string();
        assert!(item.validate().is_err());
    }

    #[test]
    fn rejects_item_with_five_number_bbox() {
        let mut item = sample_item();
        item.bbox = Some(vec![0.0, 0.0, 1.0, 1.0, 2.0]);
        assert_eq!(
            item.validate(),
            Err(InvalidDocument(
                "bbox must have 4 or 6 numbers, found 5".to_string()
            ))
        );
    }

    #[test]
    fn can_accept_null_datetime_with_range() {
        let mut item = sample_item();
        item.properties.insert("datetime".to_string(), Value::Null);
        item.properties.insert(
            "start_datetime".to_string(),
            json!("2020-01-01T00:00:00Z"),
        );
        item.properties
            .insert("end_datetime".to_string(), json!("2020-02-01T00:00:00Z"));
        assert_eq!(item.validate(), Ok(()));
    }

    #[test]
    fn rejects_null_datetime_without_range() {
        let mut item = sample_item();
        item.properties.insert("datetime".to_string(), Value::Null);
        assert!(item.validate().is_err());
    }

    #[test]
    fn can_keep_null_geometry_when_serializing() {
        let mut item = sample_item();
        item.geometry = None;
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["geometry"], Value::Null);
    }

    #[test]
    fn can_default_item_type_when_missing() {
        let item: Item = serde_json::from_value(json!({
            "stac_version": "1.0.0",
            "id": "no-type",
            "properties": {"datetime": "2020-01-01T00:00:00Z"}
        }))
        .unwrap();
        assert_eq!(item.r#type, "Feature");
        assert!(item.geometry.is_none());
    }

    #[test]
    fn can_accept_valid_collection() {
        assert_eq!(sample_collection().validate(), Ok(()));
    }

    #[test]
    fn rejects_collection_with_half_open_interval_missing_end() {
        let mut collection = sample_collection();
        collection.extent.temporal.interval = vec![vec![Some("2013-06-01T00:00:00Z".to_string())]];
        assert!(collection.validate().is_err());
    }

    #[test]
    fn skips_empty_optional_collection_members() {
        let value = serde_json::to_value(sample_collection()).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("title"));
        assert!(!object.contains_key("keywords"));
        assert!(!object.contains_key("providers"));
        assert!(!object.contains_key("summaries"));
        assert!(!object.contains_key("stac_extensions"));
    }

    #[test]
    fn can_list_conformance_classes() {
        let conformance = Conformance::current();
        assert!(
            conformance
                .conforms_to
                .contains(&"https://api.stacspec.org/v1.0.0/core".to_string())
        );
        assert_eq!(conformance.conforms_to.len(), CONFORMANCE_CLASSES.len());
    }
}
