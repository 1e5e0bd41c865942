//! Cross-collection item search.

use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::entities::item;
use crate::pagination::{self, InvalidToken, Page};
use crate::serializers::parse_datetime;
use crate::session::Session;
use crate::stac::Item;

pub mod api;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid bbox: {0}")]
    InvalidBbox(String),
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error("Cannot sort by '{0}'; sortable fields are datetime, id and collection")]
    InvalidSortField(String),
    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Search parameters as sent in a POST body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    /// A single RFC 3339 instant or an interval `start/end`, either end may be `..`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldsRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One `sortby` term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SortBy {
    /// `datetime` (or `properties.datetime`), `id` or `collection`
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortBy {
    /// Parses a GET term: `-field` sorts descending, `field` or `+field` ascending.
    fn parse(term: &str) -> Self {
        match term.strip_prefix('-') {
            Some(field) => Self {
                field: field.trim().to_string(),
                direction: SortDirection::Desc,
            },
            None => Self {
                field: term.trim_start_matches('+').trim().to_string(),
                direction: SortDirection::Asc,
            },
        }
    }

    /// The GET form of the term.
    pub fn to_query_term(&self) -> String {
        match self.direction {
            SortDirection::Asc => format!("+{}", self.field),
            SortDirection::Desc => format!("-{}", self.field),
        }
    }
}

/// Item properties to return, named `properties.<name>`.
///
/// With a non-empty `include` only the listed properties are returned; `exclude`
/// drops properties. `datetime` is always kept, along with `start_datetime` and
/// `end_datetime` when `datetime` is null. Other top-level members are always returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldsRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl FieldsRequest {
    /// Parses the GET form: comma-separated names, `-` marks an exclusion.
    fn parse(value: &str) -> Self {
        let mut fields = Self::default();
        for term in split_list(value) {
            match term.strip_prefix('-') {
                Some(name) => fields.exclude.push(name.trim().to_string()),
                None => fields.include.push(term.trim_start_matches('+').trim().to_string()),
            }
        }
        fields
    }

    /// The GET form of the selection.
    pub fn to_query_value(&self) -> String {
        self.include
            .iter()
            .cloned()
            .chain(self.exclude.iter().map(|name| format!("-{}", name)))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Drops the properties the selection does not return.
    pub fn apply(&self, item: &mut Item) {
        let include = property_names(&self.include);
        let exclude = property_names(&self.exclude);
        let open_datetime = item.properties.get("datetime").is_none_or(Value::is_null);
        let required = |name: &str| {
            name == "datetime"
                || (open_datetime && matches!(name, "start_datetime" | "end_datetime"))
        };

        item.properties.retain(|name, _| {
            required(name)
                || ((include.is_empty() || include.contains(&name.as_str()))
                    && !exclude.contains(&name.as_str()))
        });
    }
}

fn property_names(fields: &[String]) -> Vec<&str> {
    fields
        .iter()
        .filter_map(|field| field.strip_prefix("properties."))
        .collect()
}

/// Search parameters as sent in a GET query string, lists comma-separated.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Comma-separated collection IDs
    pub collections: Option<String>,
    /// Comma-separated item IDs
    pub ids: Option<String>,
    /// Comma-separated bbox numbers (4 or 6)
    pub bbox: Option<String>,
    /// RFC 3339 instant or interval
    pub datetime: Option<String>,
    /// Page size
    pub limit: Option<u64>,
    /// Continuation token from a `next` link
    pub token: Option<String>,
    /// Comma-separated sort fields, `-` prefix for descending
    pub sortby: Option<String>,
    /// Comma-separated `properties.<name>` to return, `-` prefix to exclude
    pub fields: Option<String>,
}

impl TryFrom<SearchQuery> for SearchRequest {
    type Error = SearchError;

    fn try_from(query: SearchQuery) -> Result<Self, Self::Error> {
        let bbox = query
            .bbox
            .as_deref()
            .map(|bbox| {
                split_list(bbox)
                    .iter()
                    .map(|n| {
                        n.parse::<f64>()
                            .map_err(|_| SearchError::InvalidBbox(bbox.to_string()))
                    })
                    .collect::<Result<Vec<f64>, _>>()
            })
            .transpose()?;
        Ok(Self {
            collections: query.collections.as_deref().map(split_list).unwrap_or_default(),
            ids: query.ids.as_deref().map(split_list).unwrap_or_default(),
            bbox,
            datetime: query.datetime,
            limit: query.limit,
            token: query.token,
            sortby: query
                .sortby
                .as_deref()
                .map(split_list)
                .unwrap_or_default()
                .iter()
                .map(|term| SortBy::parse(term))
                .collect(),
            fields: query.fields.as_deref().map(FieldsRequest::parse),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Inclusive datetime bounds; `None` is open-ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatetimeInterval {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl DatetimeInterval {
    pub fn parse(value: &str) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidDatetime(value.to_string());
        let bound = |part: &str| -> Result<Option<DateTime<FixedOffset>>, SearchError> {
            match part.trim() {
                "" | ".." => Ok(None),
                instant => parse_datetime(instant).map(Some).map_err(|_| invalid()),
            }
        };

        match value.split_once('/') {
            None => {
                let instant = bound(value)?.ok_or_else(invalid)?;
                Ok(Self {
                    start: Some(instant),
                    end: Some(instant),
                })
            }
            Some((start, end)) => {
                let interval = Self {
                    start: bound(start)?,
                    end: bound(end)?,
                };
                match (interval.start, interval.end) {
                    (None, None) => Err(invalid()),
                    (Some(start), Some(end)) if start > end => Err(invalid()),
                    _ => Ok(interval),
                }
            }
        }
    }
}

/// Item columns a search can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Datetime,
    Id,
    Collection,
}

impl SortField {
    fn parse(field: &str) -> Option<Self> {
        match field {
            "datetime" | "properties.datetime" => Some(Self::Datetime),
            "id" => Some(Self::Id),
            "collection" => Some(Self::Collection),
            _ => None,
        }
    }

    fn column(self) -> item::Column {
        match self {
            Self::Datetime => item::Column::Datetime,
            Self::Id => item::Column::Id,
            Self::Collection => item::Column::CollectionId,
        }
    }
}

/// A validated search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFilter {
    pub collections: Vec<String>,
    pub ids: Vec<String>,
    /// `[xmin, ymin, xmax, ymax]`
    pub bbox: Option<[f64; 4]>,
    pub datetime: Option<DatetimeInterval>,
    /// Requested ordering; empty means newest first.
    pub sort: Vec<(SortField, SortDirection)>,
    pub limit: u64,
    pub offset: u64,
}

impl TryFrom<&SearchRequest> for SearchFilter {
    type Error = SearchError;

    fn try_from(request: &SearchRequest) -> Result<Self, Self::Error> {
        let bbox = match request.bbox.as_deref() {
            None => None,
            Some([xmin, ymin, xmax, ymax]) => Some([*xmin, *ymin, *xmax, *ymax]),
            Some([xmin, ymin, _, xmax, ymax, _]) => Some([*xmin, *ymin, *xmax, *ymax]),
            Some(other) => {
                return Err(SearchError::InvalidBbox(format!(
                    "expected 4 or 6 numbers, found {}",
                    other.len()
                )));
            }
        };
        if let Some([xmin, ymin, xmax, ymax]) = bbox {
            if ymin > ymax {
                return Err(SearchError::InvalidBbox(format!(
                    "south {} is above north {}",
                    ymin, ymax
                )));
            }
            if xmin > xmax {
                tracing::debug!("bbox crosses the antimeridian; matching on its bounds only");
            }
        }

        let mut sort: Vec<(SortField, SortDirection)> = Vec::new();
        for term in &request.sortby {
            let field = SortField::parse(&term.field)
                .ok_or_else(|| SearchError::InvalidSortField(term.field.clone()))?;
            if !sort.iter().any(|(seen, _)| *seen == field) {
                sort.push((field, term.direction));
            }
        }

        Ok(Self {
            collections: request.collections.clone(),
            ids: request.ids.clone(),
            bbox,
            datetime: request
                .datetime
                .as_deref()
                .map(DatetimeInterval::parse)
                .transpose()?,
            sort,
            limit: pagination::clamp_limit(request.limit),
            offset: pagination::parse_token(request.token.as_deref())?,
        })
    }
}

impl SearchFilter {
    /// The full ordering: the requested terms, or newest first, followed by
    /// collection and ID so that pages are stable.
    pub fn ordering(&self) -> Vec<(SortField, SortDirection)> {
        let mut ordering = if self.sort.is_empty() {
            vec![(SortField::Datetime, SortDirection::Desc)]
        } else {
            self.sort.clone()
        };
        for tiebreak in [SortField::Collection, SortField::Id] {
            if !ordering.iter().any(|(field, _)| *field == tiebreak) {
                ordering.push((tiebreak, SortDirection::Asc));
            }
        }
        ordering
    }

    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if !self.collections.is_empty() {
            condition = condition.add(item::Column::CollectionId.is_in(self.collections.clone()));
        }
        if !self.ids.is_empty() {
            condition = condition.add(item::Column::Id.is_in(self.ids.clone()));
        }
        if let Some([xmin, ymin, xmax, ymax]) = self.bbox {
            condition = condition
                .add(item::Column::BboxXmin.lte(xmax))
                .add(item::Column::BboxXmax.gte(xmin))
                .add(item::Column::BboxYmin.lte(ymax))
                .add(item::Column::BboxYmax.gte(ymin));
        }
        if let Some(interval) = &self.datetime {
            if let Some(start) = interval.start {
                condition = condition.add(item::Column::Datetime.gte(start));
            }
            if let Some(end) = interval.end {
                condition = condition.add(item::Column::Datetime.lte(end));
            }
        }
        condition
    }
}

pub struct SearchService<'a> {
    session: &'a Session,
}

impl SearchService<'_> {
    pub fn new(session: &Session) -> SearchService<'_> {
        SearchService { session }
    }

    /// Finds items across collections, newest first unless the filter sorts otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, filter: &SearchFilter) -> Result<Page<item::Model>, SearchError> {
        let query = item::Entity::find().filter(filter.condition());
        let matched = query.clone().count(&self.session.reader).await?;
        let mut ordered = query;
        for (field, direction) in filter.ordering() {
            let order = match direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            ordered = ordered.order_by(field.column(), order);
        }
        let items = ordered
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.session.reader)
            .await?;
        Ok(Page {
            items,
            matched,
            offset: filter.offset,
        })
    }
}
