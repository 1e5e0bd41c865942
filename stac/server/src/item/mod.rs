use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, SqlErr,
};

use crate::entities::{collection, item};
use crate::pagination::Page;
use crate::serializers::{ItemSerializer, SerializeError, Serializer};
use crate::session::Session;
use crate::stac;

pub mod api;

/// Error type for ItemService operations.
#[derive(Debug, thiserror::Error)]
pub enum ItemServiceError {
    /// The item ID is already used within the collection.
    #[error("Item {1} already exists in collection {0}")]
    AlreadyExists(String, String),
    /// No item with this ID is stored in the collection.
    #[error("Item {1} not found in collection {0}")]
    NotFound(String, String),
    /// The parent collection does not exist.
    #[error("Collection {0} not found")]
    CollectionNotFound(String),
    /// The submitted document contradicts the request path.
    #[error("Malformed item: {0}")]
    Mismatch(String),
    /// The submitted document could not be stored.
    #[error("Malformed item: {0}")]
    MalformedData(#[from] SerializeError),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Outcome of a bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

pub struct ItemService<'a> {
    session: &'a Session,
}

impl ItemService<'_> {
    pub fn new(session: &Session) -> ItemService<'_> {
        ItemService { session }
    }

    /// Stores a new item in a collection.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - The collection from the request path.
    /// * `document` - The item; its `collection` member is filled in when absent.
    ///
    /// # Returns
    ///
    /// The stored row, `CollectionNotFound` if the collection is missing, or
    /// `AlreadyExists` if the item ID is taken within the collection.
    #[tracing::instrument(skip(self, document), fields(item_id = %document.id))]
    pub async fn create_item(
        &self,
        collection_id: &str,
        document: stac::Item,
    ) -> Result<item::Model, ItemServiceError> {
        let document = claim_for_collection(collection_id, document)?;
        self.require_collection(collection_id).await?;
        if self.find(collection_id, &document.id).await?.is_some() {
            return Err(ItemServiceError::AlreadyExists(
                collection_id.to_string(),
                document.id,
            ));
        }
        let item_id = document.id.clone();
        let active_model = ItemSerializer::stac_to_db(document)?;
        let created = active_model
            .insert(&self.session.writer)
            .await
            .map_err(|e| match e.sql_err() {
                // Lost a race with a concurrent insert of the same ID.
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    ItemServiceError::AlreadyExists(collection_id.to_string(), item_id)
                }
                // The collection was deleted after the existence check.
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                    ItemServiceError::CollectionNotFound(collection_id.to_string())
                }
                _ => ItemServiceError::Database(e),
            })?;
        Ok(created)
    }

    /// Replaces a stored item with the submitted document.
    #[tracing::instrument(skip(self, document))]
    pub async fn update_item(
        &self,
        collection_id: &str,
        item_id: &str,
        document: stac::Item,
    ) -> Result<item::Model, ItemServiceError> {
        if document.id != item_id {
            return Err(ItemServiceError::Mismatch(format!(
                "body id '{}' does not match path id '{}'",
                document.id, item_id
            )));
        }
        let mut document = claim_for_collection(collection_id, document)?;
        let existing = self
            .find(collection_id, item_id)
            .await?
            .ok_or_else(|| {
                ItemServiceError::NotFound(collection_id.to_string(), item_id.to_string())
            })?;
        if let Some(created) = existing.properties.get("created") {
            document
                .properties
                .entry("created")
                .or_insert_with(|| created.clone());
        }
        let active_model = ItemSerializer::stac_to_db(document)?;
        let updated = active_model.update(&self.session.writer).await?;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<item::Model, ItemServiceError> {
        let existing = self
            .find(collection_id, item_id)
            .await?
            .ok_or_else(|| {
                ItemServiceError::NotFound(collection_id.to_string(), item_id.to_string())
            })?;
        item::Entity::delete_by_id((collection_id.to_string(), item_id.to_string()))
            .exec(&self.session.writer)
            .await?;
        Ok(existing)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_item(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<item::Model, ItemServiceError> {
        item::Entity::find_by_id((collection_id.to_string(), item_id.to_string()))
            .one(&self.session.reader)
            .await?
            .ok_or_else(|| {
                ItemServiceError::NotFound(collection_id.to_string(), item_id.to_string())
            })
    }

    /// Retrieves one page of a collection's items, ordered by item ID.
    #[tracing::instrument(skip(self))]
    pub async fn item_collection(
        &self,
        collection_id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<Page<item::Model>, ItemServiceError> {
        let exists = collection::Entity::find_by_id(collection_id.to_string())
            .one(&self.session.reader)
            .await?
            .is_some();
        if !exists {
            return Err(ItemServiceError::CollectionNotFound(
                collection_id.to_string(),
            ));
        }

        let query = item::Entity::find().filter(item::Column::CollectionId.eq(collection_id));
        let matched = query.clone().count(&self.session.reader).await?;
        let items = query
            .order_by_asc(item::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(&self.session.reader)
            .await?;
        Ok(Page {
            items,
            matched,
            offset,
        })
    }

    /// Stores many items in one collection.
    /// Items whose ID already exists are skipped; other failures are collected.
    #[tracing::instrument(skip(self, documents), fields(count = documents.len()))]
    pub async fn bulk_create_items(
        &self,
        collection_id: &str,
        documents: Vec<stac::Item>,
    ) -> Result<BulkOutcome, ItemServiceError> {
        self.require_collection(collection_id).await?;

        let mut outcome = BulkOutcome::default();
        for document in documents {
            let item_id = document.id.clone();
            match self.create_item(collection_id, document).await {
                Ok(_) => outcome.created += 1,
                Err(ItemServiceError::AlreadyExists(_, _)) => {
                    outcome.skipped += 1;
                    tracing::info!(
                        "Skipped existing item {} in collection {}",
                        item_id,
                        collection_id
                    );
                }
                Err(e) => {
                    outcome
                        .errors
                        .push(format!("Failed to create item {}: {}", item_id, e));
                    tracing::error!("Failed to create item {}: {}", item_id, e);
                }
            }
        }
        Ok(outcome)
    }

    async fn require_collection(&self, collection_id: &str) -> Result<(), ItemServiceError> {
        collection::Entity::find_by_id(collection_id.to_string())
            .one(&self.session.writer)
            .await?
            .map(|_| ())
            .ok_or_else(|| ItemServiceError::CollectionNotFound(collection_id.to_string()))
    }

    async fn find(
        &self,
        collection_id: &str,
        item_id: &str,
    ) -> Result<Option<item::Model>, ItemServiceError> {
        let found = item::Entity::find_by_id((collection_id.to_string(), item_id.to_string()))
            .one(&self.session.writer)
            .await?;
        Ok(found)
    }
}

/// Sets the item's collection from the path, rejecting a conflicting one.
fn claim_for_collection(
    collection_id: &str,
    mut document: stac::Item,
) -> Result<stac::Item, ItemServiceError> {
    match document.collection.as_deref() {
        Some(named) if named != collection_id => Err(ItemServiceError::Mismatch(format!(
            "item {} names collection '{}' but was sent to '{}'",
            document.id, named, collection_id
        ))),
        _ => {
            document.collection = Some(collection_id.to_string());
            Ok(document)
        }
    }
}
