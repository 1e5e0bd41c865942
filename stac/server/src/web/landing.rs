//! Landing page, conformance and liveness endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::collection::CollectionService;
use crate::config::Config;
use crate::links::join_path;
use crate::stac::{
    Conformance, LandingPage, Link, MEDIA_TYPE_GEOJSON, MEDIA_TYPE_HTML, MEDIA_TYPE_JSON,
    MEDIA_TYPE_OPENAPI,
};
use crate::web::{ApiError, ErrorResponse, StacState};

#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PingResponse {
    pub message: String,
}

/// Builds the landing page for the configured service.
pub fn landing_page(config: &Config, base_url: &str, collection_ids: &[String]) -> LandingPage {
    let mut links = vec![
        Link::new("self", base_url).with_type(MEDIA_TYPE_JSON),
        Link::new("root", base_url).with_type(MEDIA_TYPE_JSON),
        Link::new("conformance", format!("{}conformance", base_url))
            .with_type(MEDIA_TYPE_JSON)
            .with_title("STAC/OGC conformance classes implemented by this server"),
        Link::new("data", format!("{}collections", base_url)).with_type(MEDIA_TYPE_JSON),
        Link::new("search", format!("{}search", base_url))
            .with_type(MEDIA_TYPE_GEOJSON)
            .with_title("STAC search"),
        Link {
            method: Some("POST".to_string()),
            ..Link::new("search", format!("{}search", base_url))
                .with_type(MEDIA_TYPE_GEOJSON)
                .with_title("STAC search")
        },
    ];
    if let Some(openapi_path) = config.openapi_path() {
        links.push(
            Link::new(
                "service-desc",
                format!("{}{}", base_url, openapi_path.trim_start_matches('/')),
            )
            .with_type(MEDIA_TYPE_OPENAPI)
            .with_title("OpenAPI service description"),
        );
    }
    if let Some(docs_path) = config.docs_path() {
        links.push(
            Link::new(
                "service-doc",
                format!("{}{}/", base_url, docs_path.trim_start_matches('/')),
            )
            .with_type(MEDIA_TYPE_HTML)
            .with_title("OpenAPI service documentation"),
        );
    }
    links.extend(collection_ids.iter().map(|id| {
        Link::new("child", join_path(base_url, &["collections", id.as_str()]))
            .with_type(MEDIA_TYPE_JSON)
    }));

    LandingPage {
        r#type: "Catalog".to_string(),
        id: config.stac_fastapi_landing_id.clone(),
        title: config.stac_fastapi_title.clone(),
        description: config.stac_fastapi_description.clone(),
        stac_version: config.stac_version.clone(),
        conforms_to: Conformance::current().conforms_to,
        links,
    }
}

/// Handler for GET / - Returns the landing page.
#[tracing::instrument(skip(state, headers))]
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page", body = LandingPage),
        (status = 424, description = "Database error", body = ErrorResponse)
    ),
    tag = "Core"
)]
pub async fn landing_page_handler(
    State(state): State<Arc<StacState>>,
    headers: HeaderMap,
) -> Result<Json<LandingPage>, ApiError> {
    let base_url = state.base_url(&headers);
    let collection_ids: Vec<String> = CollectionService::new(&state.session)
        .all_collections()
        .await?
        .into_iter()
        .map(|collection| collection.id)
        .collect();
    Ok(Json(landing_page(&state.config, &base_url, &collection_ids)))
}

/// Handler for GET /conformance - Lists the implemented conformance classes.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/conformance",
    responses((status = 200, description = "Conformance classes", body = Conformance)),
    tag = "Core"
)]
pub async fn conformance_handler() -> Json<Conformance> {
    Json(Conformance::current())
}

/// Handler for GET /_mgmt/ping - Liveness check.
#[tracing::instrument]
#[utoipa::path(
    get,
    path = "/_mgmt/ping",
    responses((status = 200, description = "Service is alive", body = PingResponse)),
    tag = "Management"
)]
pub async fn ping_handler() -> Json<PingResponse> {
    Json(PingResponse {
        message: "PONG".to_string(),
    })
}

pub fn create_core_router(state: Arc<StacState>) -> Router {
    Router::new()
        .route("/", get(landing_page_handler))
        .route("/conformance", get(conformance_handler))
        .route("/_mgmt/ping", get(ping_handler))
        .with_state(state)
}
