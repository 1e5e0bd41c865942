use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, SqlErr};

use crate::entities::collection;
use crate::serializers::{CollectionSerializer, SerializeError, Serializer};
use crate::session::Session;
use crate::stac;

pub mod api;

/// Error type for CollectionService operations.
#[derive(Debug, thiserror::Error)]
pub enum CollectionServiceError {
    /// A collection with this ID is already stored.
    #[error("Collection {0} already exists")]
    AlreadyExists(String),
    /// No collection with this ID is stored.
    #[error("Collection {0} not found")]
    NotFound(String),
    /// The submitted document could not be stored.
    #[error("Malformed collection: {0}")]
    MalformedData(#[from] SerializeError),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

pub struct CollectionService<'a> {
    session: &'a Session,
}

impl CollectionService<'_> {
    pub fn new(session: &Session) -> CollectionService<'_> {
        CollectionService { session }
    }

    /// Stores a new collection.
    ///
    /// # Returns
    ///
    /// The stored row, or `AlreadyExists` if the ID is taken, including by a
    /// concurrent request that inserted it after the existence check.
    #[tracing::instrument(skip(self, document), fields(collection_id = %document.id))]
    pub async fn create_collection(
        &self,
        document: stac::Collection,
    ) -> Result<collection::Model, CollectionServiceError> {
        if self.find(&document.id).await?.is_some() {
            return Err(CollectionServiceError::AlreadyExists(document.id));
        }
        let collection_id = document.id.clone();
        let active_model = CollectionSerializer::stac_to_db(document)?;
        let created = active_model
            .insert(&self.session.writer)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    CollectionServiceError::AlreadyExists(collection_id)
                }
                _ => CollectionServiceError::Database(e),
            })?;
        Ok(created)
    }

    /// Replaces a stored collection with the submitted document.
    #[tracing::instrument(skip(self, document), fields(collection_id = %document.id))]
    pub async fn update_collection(
        &self,
        document: stac::Collection,
    ) -> Result<collection::Model, CollectionServiceError> {
        if self.find(&document.id).await?.is_none() {
            return Err(CollectionServiceError::NotFound(document.id));
        }
        let active_model = CollectionSerializer::stac_to_db(document)?;
        let updated = active_model.update(&self.session.writer).await?;
        Ok(updated)
    }

    /// Deletes a collection. Its items are removed by the foreign key cascade.
    #[tracing::instrument(skip(self))]
    pub async fn delete_collection(
        &self,
        collection_id: &str,
    ) -> Result<collection::Model, CollectionServiceError> {
        let existing = self
            .find(collection_id)
            .await?
            .ok_or_else(|| CollectionServiceError::NotFound(collection_id.to_string()))?;
        collection::Entity::delete_by_id(collection_id.to_string())
            .exec(&self.session.writer)
            .await?;
        Ok(existing)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_collection(
        &self,
        collection_id: &str,
    ) -> Result<collection::Model, CollectionServiceError> {
        collection::Entity::find_by_id(collection_id.to_string())
            .one(&self.session.reader)
            .await?
            .ok_or_else(|| CollectionServiceError::NotFound(collection_id.to_string()))
    }

    /// Retrieves every collection, ordered by ID.
    #[tracing::instrument(skip(self))]
    pub async fn all_collections(&self) -> Result<Vec<collection::Model>, CollectionServiceError> {
        let collections = collection::Entity::find()
            .order_by_asc(collection::Column::Id)
            .all(&self.session.reader)
            .await?;
        Ok(collections)
    }

    /// Looks a collection up on the writer so checks see the latest writes.
    async fn find(
        &self,
        collection_id: &str,
    ) -> Result<Option<collection::Model>, CollectionServiceError> {
        let found = collection::Entity::find_by_id(collection_id.to_string())
            .one(&self.session.writer)
            .await?;
        Ok(found)
    }
}
