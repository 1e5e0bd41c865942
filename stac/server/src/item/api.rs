use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;
use utoipa::{IntoParams, ToSchema};

use crate::item::ItemService;
use crate::links::join_path;
use crate::pagination;
use crate::serializers::{ItemSerializer, Serializer};
use crate::stac::{Item, ItemCollection, Link, MEDIA_TYPE_GEOJSON, MEDIA_TYPE_JSON};
use crate::web::{ApiError, ErrorResponse, StacJson, StacQuery, StacState};

/// Query parameters for paging through a collection's items.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemsQuery {
    /// Page size, 1 to 10000
    pub limit: Option<u64>,
    /// Continuation token from a `next` link
    pub token: Option<String>,
}

/// Items to insert, keyed by item ID.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct BulkItems {
    pub items: BTreeMap<String, Item>,
}

/// Result of a bulk insert.
#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
pub struct BulkItemsResponse {
    /// Number of items stored
    pub created: usize,
    /// Number of items skipped because their ID already existed
    pub skipped: usize,
    /// Failures for the remaining items
    pub errors: Vec<String>,
}

/// Handler for GET /collections/{collection_id}/items - Returns one page of items.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/collections/{collection_id}/items",
    params(
        ("collection_id" = String, Path, description = "Collection ID"),
        ItemsQuery
    ),
    responses(
        (status = 200, description = "Successfully retrieved items", body = ItemCollection),
        (status = 400, description = "Invalid token", body = ErrorResponse),
        (status = 404, description = "Collection not found", body = ErrorResponse)
    ),
    tag = "Core"
)]
pub async fn get_items_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    StacQuery(query): StacQuery<ItemsQuery>,
    headers: HeaderMap,
) -> Result<Json<ItemCollection>, ApiError> {
    let limit = pagination::clamp_limit(query.limit);
    let offset = pagination::parse_token(query.token.as_deref())
        .map_err(|e| ApiError::InvalidQueryParameter(e.to_string()))?;
    let page = ItemService::new(&state.session)
        .item_collection(&collection_id, limit, offset)
        .await?;

    let base_url = state.base_url(&headers);
    let collection_url = join_path(&base_url, &["collections", collection_id.as_str()]);
    let items_url = join_path(&base_url, &["collections", collection_id.as_str(), "items"]);
    let mut links = vec![
        Link::new("self", items_url.clone()).with_type(MEDIA_TYPE_GEOJSON),
        Link::new("parent", collection_url.clone()).with_type(MEDIA_TYPE_JSON),
        Link::new("collection", collection_url).with_type(MEDIA_TYPE_JSON),
        Link::new("root", base_url.clone()).with_type(MEDIA_TYPE_JSON),
    ];
    if let Some(token) = page.next_token() {
        links.push(
            Link::new("next", next_page_url(&items_url, limit, &token))
                .with_type(MEDIA_TYPE_GEOJSON),
        );
    }

    let matched = page.matched;
    let features = page
        .items
        .into_iter()
        .map(|model| ItemSerializer::db_to_stac(model, &base_url))
        .collect::<Result<Vec<_>, _>>()?;
    let mut document = ItemCollection::new(features, links);
    document.number_matched = Some(matched);
    state.respond(document)
}

fn next_page_url(items_url: &str, limit: u64, token: &str) -> String {
    match Url::parse(items_url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string())
                .append_pair("token", token);
            url.to_string()
        }
        Err(_) => format!("{}?limit={}&token={}", items_url, limit, token),
    }
}

/// Handler for GET /collections/{collection_id}/items/{item_id} - Returns one item.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/collections/{collection_id}/items/{item_id}",
    params(
        ("collection_id" = String, Path, description = "Collection ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Successfully retrieved item", body = Item),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "Core"
)]
pub async fn get_item_handler(
    State(state): State<Arc<StacState>>,
    Path((collection_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Item>, ApiError> {
    let model = ItemService::new(&state.session)
        .get_item(&collection_id, &item_id)
        .await?;
    let document = ItemSerializer::db_to_stac(model, &state.base_url(&headers))?;
    state.respond(document)
}

/// Handler for POST /collections/{collection_id}/items - Stores a new item.
#[tracing::instrument(skip(state, headers, document))]
#[utoipa::path(
    post,
    path = "/collections/{collection_id}/items",
    params(("collection_id" = String, Path, description = "Collection ID")),
    request_body = Item,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid item", body = ErrorResponse),
        (status = 404, description = "Collection not found", body = ErrorResponse),
        (status = 409, description = "Item already exists", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn create_item_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
    StacJson(document): StacJson<Item>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let created = ItemService::new(&state.session)
        .create_item(&collection_id, document)
        .await?;
    let document = ItemSerializer::db_to_stac(created, &state.base_url(&headers))?;
    Ok((StatusCode::CREATED, state.respond(document)?))
}

/// Handler for PUT /collections/{collection_id}/items/{item_id} - Replaces an item.
#[tracing::instrument(skip(state, headers, document))]
#[utoipa::path(
    put,
    path = "/collections/{collection_id}/items/{item_id}",
    params(
        ("collection_id" = String, Path, description = "Collection ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    request_body = Item,
    responses(
        (status = 200, description = "Item updated", body = Item),
        (status = 400, description = "Invalid item", body = ErrorResponse),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn update_item_handler(
    State(state): State<Arc<StacState>>,
    Path((collection_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
    StacJson(document): StacJson<Item>,
) -> Result<Json<Item>, ApiError> {
    let updated = ItemService::new(&state.session)
        .update_item(&collection_id, &item_id, document)
        .await?;
    let document = ItemSerializer::db_to_stac(updated, &state.base_url(&headers))?;
    state.respond(document)
}

/// Handler for DELETE /collections/{collection_id}/items/{item_id} - Deletes an item.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    delete,
    path = "/collections/{collection_id}/items/{item_id}",
    params(
        ("collection_id" = String, Path, description = "Collection ID"),
        ("item_id" = String, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item deleted", body = Item),
        (status = 404, description = "Item not found", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn delete_item_handler(
    State(state): State<Arc<StacState>>,
    Path((collection_id, item_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Item>, ApiError> {
    let deleted = ItemService::new(&state.session)
        .delete_item(&collection_id, &item_id)
        .await?;
    let document = ItemSerializer::db_to_stac(deleted, &state.base_url(&headers))?;
    state.respond(document)
}

/// Handler for POST /collections/{collection_id}/bulk_items - Inserts many items.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/collections/{collection_id}/bulk_items",
    params(("collection_id" = String, Path, description = "Collection ID")),
    request_body = BulkItems,
    responses(
        (status = 200, description = "Bulk insert finished", body = BulkItemsResponse),
        (status = 404, description = "Collection not found", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn bulk_items_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    StacJson(payload): StacJson<BulkItems>,
) -> Result<Json<BulkItemsResponse>, ApiError> {
    let documents: Vec<Item> = payload
        .items
        .into_iter()
        .map(|(key, mut item)| {
            if item.id.is_empty() {
                item.id = key;
            }
            item
        })
        .collect();
    let outcome = ItemService::new(&state.session)
        .bulk_create_items(&collection_id, documents)
        .await?;
    tracing::info!(
        "Bulk insert into {}: {} created, {} skipped, {} failed",
        collection_id,
        outcome.created,
        outcome.skipped,
        outcome.errors.len()
    );
    Ok(Json(BulkItemsResponse {
        created: outcome.created,
        skipped: outcome.skipped,
        errors: outcome.errors,
    }))
}

/// Creates and returns the items API router.
pub fn create_api_router(state: Arc<StacState>) -> Router {
    Router::new()
        .route(
            "/collections/{collection_id}/items",
            get(get_items_handler).post(create_item_handler),
        )
        .route(
            "/collections/{collection_id}/items/{item_id}",
            get(get_item_handler)
                .put(update_item_handler)
                .delete(delete_item_handler),
        )
        .route(
            "/collections/{collection_id}/bulk_items",
            post(bulk_items_handler),
        )
        .with_state(state)
}
