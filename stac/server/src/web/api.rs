use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;
use utoipa::openapi::server::Server;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::landing::landing_page_handler,
        crate::web::landing::conformance_handler,
        crate::web::landing::ping_handler,
        crate::collection::api::get_collections_handler,
        crate::collection::api::get_collection_handler,
        crate::collection::api::create_collection_handler,
        crate::collection::api::update_collection_handler,
        crate::collection::api::delete_collection_handler,
        crate::item::api::get_items_handler,
        crate::item::api::get_item_handler,
        crate::item::api::create_item_handler,
        crate::item::api::update_item_handler,
        crate::item::api::delete_item_handler,
        crate::item::api::bulk_items_handler,
        crate::search::api::get_search_handler,
        crate::search::api::post_search_handler,
    ),
    components(schemas(
        crate::stac::Link,
        crate::stac::Item,
        crate::stac::ItemCollection,
        crate::stac::Collection,
        crate::stac::Collections,
        crate::stac::Extent,
        crate::stac::SpatialExtent,
        crate::stac::TemporalExtent,
        crate::stac::LandingPage,
        crate::stac::Conformance,
        crate::search::SearchRequest,
        crate::search::SortBy,
        crate::search::SortDirection,
        crate::search::FieldsRequest,
        crate::item::api::BulkItems,
        crate::item::api::BulkItemsResponse,
        crate::web::landing::PingResponse,
        crate::web::ErrorResponse,
    )),
    tags(
        (name = "Core", description = "STAC API core, collections and features"),
        (name = "Transaction", description = "Create, update and delete collections and items"),
        (name = "Search", description = "Cross-collection item search"),
        (name = "Management", description = "Service health")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document, described with the configured title, description and version.
pub fn api_doc(config: &Config) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = config.stac_fastapi_title.clone();
    doc.info.description = Some(config.stac_fastapi_description.clone());
    doc.info.version = config.stac_fastapi_version.clone();
    let root_path = config.root_path();
    if !root_path.is_empty() {
        doc.servers = Some(vec![Server::new(root_path)]);
    }
    doc
}

/// Route serving the OpenAPI document, relative to the root path.
pub fn create_openapi_router(config: &Config) -> Router {
    let Some(openapi_path) = config.openapi_path() else {
        tracing::info!("openapi_url is empty; OpenAPI document and docs are disabled");
        return Router::new();
    };

    let doc = api_doc(config);
    Router::new().route(&openapi_path, get(move || async move { Json(doc) }))
}

/// Swagger UI routes at their public path, root path included.
///
/// The UI redirects `{docs}` to the absolute `{docs}/`, so it is mounted outside the
/// root path nest with the full path rather than nested under it.
pub fn create_swagger_router(config: &Config) -> Router {
    let (Some(openapi_path), Some(docs_path)) = (config.openapi_path(), config.docs_path()) else {
        return Router::new();
    };

    let root_path = config.root_path();
    // The UI fetches the document from the browser, so it needs the mounted URL.
    let public_openapi_url = format!("{}{}", root_path, openapi_path);
    let swagger = SwaggerUi::new(format!("{}{}", root_path, docs_path))
        .config(utoipa_swagger_ui::Config::new([public_openapi_url]));
    Router::new().merge(swagger)
}
