use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::get,
};
use std::sync::Arc;
use url::Url;

use crate::entities::item;
use crate::pagination::Page;
use crate::search::{FieldsRequest, SearchFilter, SearchQuery, SearchRequest, SearchService};
use crate::serializers::{ItemSerializer, Serializer};
use crate::stac::{ItemCollection, Link, MEDIA_TYPE_GEOJSON, MEDIA_TYPE_JSON};
use crate::web::{ApiError, ErrorResponse, StacJson, StacQuery, StacState};

/// Handler for GET /search - Searches items with query string parameters.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching items", body = ItemCollection),
        (status = 400, description = "Invalid search parameters", body = ErrorResponse)
    ),
    tag = "Search"
)]
pub async fn get_search_handler(
    State(state): State<Arc<StacState>>,
    StacQuery(query): StacQuery<SearchQuery>,
    headers: HeaderMap,
) -> Result<Json<ItemCollection>, ApiError> {
    let request = SearchRequest::try_from(query)?;
    let filter = SearchFilter::try_from(&request)?;
    let page = SearchService::new(&state.session).search(&filter).await?;

    let base_url = state.base_url(&headers);
    let search_url = format!("{}search", base_url);
    let next = page.next_token().map(|token| {
        Link::new("next", next_search_url(&search_url, &request, &token))
            .with_type(MEDIA_TYPE_GEOJSON)
    });
    respond_with_page(&state, page, &base_url, search_url, next, request.fields.as_ref())
}

/// Handler for POST /search - Searches items with a JSON body.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    post,
    path = "/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Matching items", body = ItemCollection),
        (status = 400, description = "Invalid search parameters", body = ErrorResponse)
    ),
    tag = "Search"
)]
pub async fn post_search_handler(
    State(state): State<Arc<StacState>>,
    headers: HeaderMap,
    StacJson(request): StacJson<SearchRequest>,
) -> Result<Json<ItemCollection>, ApiError> {
    let filter = SearchFilter::try_from(&request)?;
    let page = SearchService::new(&state.session).search(&filter).await?;

    let base_url = state.base_url(&headers);
    let search_url = format!("{}search", base_url);
    let fields = request.fields.clone();
    let next = match page.next_token() {
        Some(token) => {
            let body = SearchRequest {
                token: Some(token),
                ..request
            };
            Some(Link {
                method: Some("POST".to_string()),
                body: Some(
                    serde_json::to_value(&body).map_err(|e| ApiError::Internal(e.to_string()))?,
                ),
                ..Link::new("next", search_url.clone()).with_type(MEDIA_TYPE_GEOJSON)
            })
        }
        None => None,
    };
    respond_with_page(&state, page, &base_url, search_url, next, fields.as_ref())
}

fn respond_with_page(
    state: &StacState,
    page: Page<item::Model>,
    base_url: &str,
    search_url: String,
    next: Option<Link>,
    fields: Option<&FieldsRequest>,
) -> Result<Json<ItemCollection>, ApiError> {
    let mut links = vec![
        Link::new("self", search_url).with_type(MEDIA_TYPE_GEOJSON),
        Link::new("root", base_url).with_type(MEDIA_TYPE_JSON),
    ];
    links.extend(next);

    let matched = page.matched;
    let mut features = page
        .items
        .into_iter()
        .map(|model| ItemSerializer::db_to_stac(model, base_url))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(fields) = fields {
        features.iter_mut().for_each(|feature| fields.apply(feature));
    }
    let mut document = ItemCollection::new(features, links);
    document.number_matched = Some(matched);
    state.respond(document)
}

/// Rebuilds the GET query for the following page.
fn next_search_url(search_url: &str, request: &SearchRequest, token: &str) -> String {
    let Ok(mut url) = Url::parse(search_url) else {
        return format!("{}?token={}", search_url, token);
    };
    {
        let mut pairs = url.query_pairs_mut();
        if !request.collections.is_empty() {
            pairs.append_pair("collections", &request.collections.join(","));
        }
        if !request.ids.is_empty() {
            pairs.append_pair("ids", &request.ids.join(","));
        }
        if let Some(bbox) = &request.bbox {
            let bbox: Vec<String> = bbox.iter().map(f64::to_string).collect();
            pairs.append_pair("bbox", &bbox.join(","));
        }
        if let Some(datetime) = &request.datetime {
            pairs.append_pair("datetime", datetime);
        }
        if let Some(limit) = request.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
        if !request.sortby.is_empty() {
            let sortby: Vec<String> = request.sortby.iter().map(|s| s.to_query_term()).collect();
            pairs.append_pair("sortby", &sortby.join(","));
        }
        if let Some(fields) = &request.fields {
            pairs.append_pair("fields", &fields.to_query_value());
        }
        pairs.append_pair("token", token);
    }
    url.to_string()
}

/// Creates and returns the search API router.
pub fn create_api_router(state: Arc<StacState>) -> Router {
    Router::new()
        .route("/search", get(get_search_handler).post(post_search_handler))
        .with_state(state)
}
