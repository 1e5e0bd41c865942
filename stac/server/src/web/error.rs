use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::collection::CollectionServiceError;
use crate::item::ItemServiceError;
use crate::search::SearchError;
use crate::serializers::SerializeError;
use crate::stac::InvalidDocument;

/// JSON body returned for every API error.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Error class, e.g. `NotFoundError`
    pub code: String,
    /// Human readable explanation
    pub description: String,
}

/// Custom error type for API handler operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidQueryParameter(String),
    /// The request body is not an acceptable STAC document.
    #[error("{0}")]
    InvalidBody(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    /// A stored or outgoing document failed to serialize or validate.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFoundError"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::InvalidQueryParameter(_) => {
                (StatusCode::BAD_REQUEST, "InvalidQueryParameter")
            }
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "RequestValidationError"),
            ApiError::Database(_) => (StatusCode::FAILED_DEPENDENCY, "DatabaseError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let description = match &self {
            ApiError::Database(err) => {
                tracing::error!("Database failure: {}", err);
                "A database error occurred while processing your request.".to_string()
            }
            ApiError::Internal(message) => {
                tracing::error!("Internal failure: {}", message);
                "An unexpected error occurred while processing your request.".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            code: code.to_string(),
            description,
        };
        (status, Json(body)).into_response()
    }
}

impl From<CollectionServiceError> for ApiError {
    fn from(err: CollectionServiceError) -> Self {
        match err {
            CollectionServiceError::AlreadyExists(_) => ApiError::Conflict(err.to_string()),
            CollectionServiceError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CollectionServiceError::MalformedData(_) => ApiError::InvalidBody(err.to_string()),
            CollectionServiceError::Database(db) => ApiError::Database(db),
        }
    }
}

impl From<ItemServiceError> for ApiError {
    fn from(err: ItemServiceError) -> Self {
        match err {
            ItemServiceError::AlreadyExists(_, _) => ApiError::Conflict(err.to_string()),
            ItemServiceError::NotFound(_, _) | ItemServiceError::CollectionNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ItemServiceError::Mismatch(_) | ItemServiceError::MalformedData(_) => {
                ApiError::InvalidBody(err.to_string())
            }
            ItemServiceError::Database(db) => ApiError::Database(db),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Database(db) => ApiError::Database(db),
            other => ApiError::InvalidQueryParameter(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidQueryParameter(rejection.body_text())
    }
}

/// Stored rows that no longer convert are server-side faults.
impl From<SerializeError> for ApiError {
    fn from(err: SerializeError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<InvalidDocument> for ApiError {
    fn from(err: InvalidDocument) -> Self {
        ApiError::Internal(format!("Response failed validation: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(error: ApiError) -> (StatusCode, ErrorResponse) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn can_render_not_found_error() {
        let error = ApiError::from(ItemServiceError::NotFound(
            "landsat".to_string(),
            "scene-9".to_string(),
        ));
        let (status, body) = body_of(error).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            ErrorResponse {
                code: "NotFoundError".to_string(),
                description: "Item scene-9 not found in collection landsat".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn can_render_conflict_error() {
        let error = ApiError::from(CollectionServiceError::AlreadyExists("landsat".to_string()));
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "ConflictError");
    }

    #[tokio::test]
    async fn can_hide_database_details() {
        let error = ApiError::from(sea_orm::DbErr::Custom("password leaked".to_string()));
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
        assert_eq!(body.code, "DatabaseError");
        assert!(!body.description.contains("password"));
    }

    #[tokio::test]
    async fn can_map_search_errors_to_bad_request() {
        let error = ApiError::from(SearchError::InvalidDatetime("soon".to_string()));
        let (status, body) = body_of(error).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "InvalidQueryParameter");
        assert_eq!(body.description, "Invalid datetime: soon");
    }
}
