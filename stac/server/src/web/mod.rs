use axum::extract::{FromRequest, FromRequestParts};
use axum::http::{HeaderMap, header};
use axum::routing::get;
use axum::{Json, Router};
use migration::MigratorTrait;
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, ResponseMode};
use crate::session::Session;
use crate::stac::Validate;

pub mod api;
pub mod error;
pub mod landing;

pub use error::{ApiError, ErrorResponse};

/// JSON body extractor whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct StacJson<T>(pub T);

/// Query string extractor whose rejections use the API error format.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct StacQuery<T>(pub T);

/// State shared by every handler.
#[derive(Clone)]
pub struct StacState {
    pub config: Arc<Config>,
    pub session: Session,
    pub response_mode: ResponseMode,
}

impl StacState {
    pub fn new(config: Config, session: Session) -> Self {
        let response_mode = config.response_mode();
        Self {
            config: Arc::new(config),
            session,
            response_mode,
        }
    }

    /// The externally visible URL of the API root, always ending with a slash.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}:{}", self.config.app_host, self.config.app_port));
        let scheme = headers
            .get("x-forwarded-proto")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("http");
        format!("{}://{}{}/", scheme, host, self.config.root_path())
    }

    /// Wraps an outgoing document, validating it first in `Validated` mode.
    pub fn respond<T: Validate + Serialize>(&self, document: T) -> Result<Json<T>, ApiError> {
        if self.response_mode == ResponseMode::Validated {
            document.validate()?;
        }
        Ok(Json(document))
    }
}

/// Builds the complete application router, mounted under the configured root path.
pub fn create_app(state: Arc<StacState>) -> Router {
    let api_routes = Router::new()
        .merge(landing::create_core_router(state.clone()))
        .merge(crate::collection::api::create_api_router(state.clone()))
        .merge(crate::item::api::create_api_router(state.clone()))
        .merge(crate::search::api::create_api_router(state.clone()))
        .merge(api::create_openapi_router(&state.config));

    let root_path = state.config.root_path();
    let app = if root_path.is_empty() {
        api_routes
    } else {
        // Links to the landing page end with a slash, which the nest alone does not match.
        Router::new().nest(&root_path, api_routes).merge(
            Router::new()
                .route(&format!("{}/", root_path), get(landing::landing_page_handler))
                .with_state(state.clone()),
        )
    };

    app.merge(api::create_swagger_router(&state.config)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    if config.reload {
        tracing::warn!(
            "reload is enabled; restart on code change must come from an external watcher"
        );
    }

    let session = Session::connect(&config).await?;
    migration::Migrator::up(&session.writer, None).await?;
    tracing::info!("Database migrations applied successfully");

    let server_address = format!("{}:{}", config.app_host, config.app_port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!(
        "{} {} running on http://{}{}",
        config.stac_fastapi_title,
        config.stac_fastapi_version,
        server_address,
        config.root_path()
    );

    let state = Arc::new(StacState::new(config, session));
    let app = create_app(state);

    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request, StatusCode};
    use sea_orm::DatabaseConnection;
    use tower::ServiceExt;

    fn state_with(config: Config) -> StacState {
        StacState::new(config, Session::single(DatabaseConnection::Disconnected))
    }

    #[test]
    fn can_build_base_url_from_host_header() {
        let state = state_with(Config::default());
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("catalog.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));

        assert_eq!(state.base_url(&headers), "https://catalog.example.com/");
    }

    #[test]
    fn can_fall_back_to_bind_address_and_root_path() {
        let config = Config {
            root_path: "/stac/".to_string(),
            ..Config::default()
        };
        let state = state_with(config);

        assert_eq!(state.base_url(&HeaderMap::new()), "http://0.0.0.0:8080/stac/");
    }

    #[test]
    fn can_reject_invalid_documents_in_validated_mode() {
        let config = Config {
            enable_response_models: true,
            ..Config::default()
        };
        let state = state_with(config);
        let item: crate::stac::Item = serde_json::from_value(serde_json::json!({
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "broken",
            "properties": {}
        }))
        .unwrap();

        assert!(state.respond(item.clone()).is_err());

        let direct = state_with(Config::default());
        assert!(direct.respond(item).is_ok());
    }

    #[tokio::test]
    async fn can_serve_ping_and_docs_without_database() {
        let app = create_app(Arc::new(state_with(Config::default())));

        let ping = Request::get("/_mgmt/ping").body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(ping).await.unwrap().status(), StatusCode::OK);

        let docs = Request::get("/api.html/").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(docs).await.unwrap().status(), StatusCode::OK);
    }

    async fn status_of(app: &Router, uri: &str) -> StatusCode {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn can_redirect_docs_under_root_path() {
        let config = Config {
            root_path: "/stac".to_string(),
            ..Config::default()
        };
        let app = create_app(Arc::new(state_with(config)));

        let request = Request::get("/stac/api.html").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert!(response.status().is_redirection());
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/stac/api.html/"
        );

        assert_eq!(status_of(&app, "/stac/api.html/").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/stac/api").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/api.html/").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn can_disable_openapi_and_docs() {
        let config = Config {
            openapi_url: String::new(),
            ..Config::default()
        };
        let app = create_app(Arc::new(state_with(config)));

        assert_eq!(status_of(&app, "/api").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(&app, "/api.html/").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(&app, "/_mgmt/ping").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn can_disable_docs_but_keep_openapi() {
        let config = Config {
            docs_url: String::new(),
            ..Config::default()
        };
        let app = create_app(Arc::new(state_with(config)));

        assert_eq!(status_of(&app, "/api").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/api.html").await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(&app, "/api.html/").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn can_reject_out_of_range_token_as_json_error() {
        let app = create_app(Arc::new(state_with(Config::default())));

        for uri in [
            "/search?token=next:18446744073709551615",
            "/collections/landsat/items?token=next:9223372036854775808",
        ] {
            let request = Request::get(uri).body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(error.code, "InvalidQueryParameter");
        }
    }

    #[tokio::test]
    async fn can_reject_malformed_body_as_json_error() {
        let app = create_app(Arc::new(state_with(Config::default())));
        let request = Request::post("/collections")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "RequestValidationError");
    }

    #[tokio::test]
    async fn can_reject_malformed_query_as_json_error() {
        let app = create_app(Arc::new(state_with(Config::default())));
        let request = Request::get("/search?limit=many")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "InvalidQueryParameter");
    }
}
