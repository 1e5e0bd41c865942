use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
};
use std::sync::Arc;

use crate::collection::CollectionService;
use crate::serializers::{CollectionSerializer, Serializer};
use crate::stac::{Collection, Collections, Link, MEDIA_TYPE_JSON};
use crate::web::{ApiError, ErrorResponse, StacJson, StacState};

/// Handler for GET /collections - Returns all collections.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/collections",
    responses(
        (status = 200, description = "Successfully retrieved collections", body = Collections),
        (status = 424, description = "Database error", body = ErrorResponse)
    ),
    tag = "Core"
)]
pub async fn get_collections_handler(
    State(state): State<Arc<StacState>>,
    headers: HeaderMap,
) -> Result<Json<Collections>, ApiError> {
    let base_url = state.base_url(&headers);
    let collections = CollectionService::new(&state.session)
        .all_collections()
        .await?
        .into_iter()
        .map(|model| CollectionSerializer::db_to_stac(model, &base_url))
        .collect::<Result<Vec<_>, _>>()?;

    let links = vec![
        Link::new("root", base_url.clone()).with_type(MEDIA_TYPE_JSON),
        Link::new("parent", base_url.clone()).with_type(MEDIA_TYPE_JSON),
        Link::new("self", format!("{}collections", base_url)).with_type(MEDIA_TYPE_JSON),
    ];
    state.respond(Collections { collections, links })
}

/// Handler for GET /collections/{collection_id} - Returns one collection.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/collections/{collection_id}",
    params(("collection_id" = String, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Successfully retrieved collection", body = Collection),
        (status = 404, description = "Collection not found", body = ErrorResponse)
    ),
    tag = "Core"
)]
pub async fn get_collection_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Collection>, ApiError> {
    let model = CollectionService::new(&state.session)
        .get_collection(&collection_id)
        .await?;
    let document = CollectionSerializer::db_to_stac(model, &state.base_url(&headers))?;
    state.respond(document)
}

/// Handler for POST /collections - Stores a new collection.
#[tracing::instrument(skip(state, headers, document))]
#[utoipa::path(
    post,
    path = "/collections",
    request_body = Collection,
    responses(
        (status = 201, description = "Collection created", body = Collection),
        (status = 400, description = "Invalid collection", body = ErrorResponse),
        (status = 409, description = "Collection already exists", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn create_collection_handler(
    State(state): State<Arc<StacState>>,
    headers: HeaderMap,
    StacJson(document): StacJson<Collection>,
) -> Result<(StatusCode, Json<Collection>), ApiError> {
    let created = CollectionService::new(&state.session)
        .create_collection(document)
        .await?;
    let document = CollectionSerializer::db_to_stac(created, &state.base_url(&headers))?;
    Ok((StatusCode::CREATED, state.respond(document)?))
}

/// Handler for PUT /collections/{collection_id} - Replaces a collection.
#[tracing::instrument(skip(state, headers, document))]
#[utoipa::path(
    put,
    path = "/collections/{collection_id}",
    params(("collection_id" = String, Path, description = "Collection ID")),
    request_body = Collection,
    responses(
        (status = 200, description = "Collection updated", body = Collection),
        (status = 400, description = "Invalid collection", body = ErrorResponse),
        (status = 404, description = "Collection not found", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn update_collection_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
    StacJson(document): StacJson<Collection>,
) -> Result<Json<Collection>, ApiError> {
    if document.id != collection_id {
        return Err(ApiError::InvalidBody(format!(
            "body id '{}' does not match path id '{}'",
            document.id, collection_id
        )));
    }
    let updated = CollectionService::new(&state.session)
        .update_collection(document)
        .await?;
    let document = CollectionSerializer::db_to_stac(updated, &state.base_url(&headers))?;
    state.respond(document)
}

/// Handler for DELETE /collections/{collection_id} - Deletes a collection and its items.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    delete,
    path = "/collections/{collection_id}",
    params(("collection_id" = String, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection deleted", body = Collection),
        (status = 404, description = "Collection not found", body = ErrorResponse)
    ),
    tag = "Transaction"
)]
pub async fn delete_collection_handler(
    State(state): State<Arc<StacState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Collection>, ApiError> {
    let deleted = CollectionService::new(&state.session)
        .delete_collection(&collection_id)
        .await?;
    let document = CollectionSerializer::db_to_stac(deleted, &state.base_url(&headers))?;
    state.respond(document)
}

/// Creates and returns the collections API router.
pub fn create_api_router(state: Arc<StacState>) -> Router {
    Router::new()
        .route(
            "/collections",
            get(get_collections_handler).post(create_collection_handler),
        )
        .route(
            "/collections/{collection_id}",
            get(get_collection_handler)
                .put(update_collection_handler)
                .delete(delete_collection_handler),
        )
        .with_state(state)
}
