use sea_orm::DatabaseConnection;
use stac_server::collection::{CollectionService, CollectionServiceError};
use stac_server::session::Session;
use testcontainers_modules::{postgres, testcontainers};

mod common;

pub struct TestContext {
    #[allow(dead_code)] // container is kept to ensure it's not dropped
    pub container: testcontainers::ContainerAsync<postgres::Postgres>,
    pub session: Session,
}

async fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let container = common::setup_container().await?;
    let db: DatabaseConnection = common::setup_db(&container).await?;
    Ok(TestContext {
        session: Session::single(db),
        container,
    })
}

#[tokio::test]
async fn can_create_and_get_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);

    let created = service
        .create_collection(common::collection_document("landsat"))
        .await
        .expect("Failed to create collection");
    assert_eq!(created.id, "landsat");
    assert_eq!(created.title.as_deref(), Some("landsat scenes"));

    let fetched = service
        .get_collection("landsat")
        .await
        .expect("Failed to get collection");
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn reports_conflict_for_concurrent_duplicate_creates() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);

    for round in 0..5 {
        let id = format!("race-{}", round);
        let (first, second) = tokio::join!(
            service.create_collection(common::collection_document(&id)),
            service.create_collection(common::collection_document(&id)),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(CollectionServiceError::AlreadyExists(conflict)) if *conflict == id
        )));
    }
}

#[tokio::test]
async fn rejects_duplicate_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);
    service
        .create_collection(common::collection_document("landsat"))
        .await
        .expect("Failed to create collection");

    let result = service
        .create_collection(common::collection_document("landsat"))
        .await;
    assert!(matches!(
        result,
        Err(CollectionServiceError::AlreadyExists(id)) if id == "landsat"
    ));
}

#[tokio::test]
async fn can_update_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);
    service
        .create_collection(common::collection_document("landsat"))
        .await
        .expect("Failed to create collection");

    let mut document = common::collection_document("landsat");
    document.description = "Reprocessed imagery".to_string();
    let updated = service
        .update_collection(document)
        .await
        .expect("Failed to update collection");
    assert_eq!(updated.description, "Reprocessed imagery");

    let missing = service
        .update_collection(common::collection_document("sentinel"))
        .await;
    assert!(matches!(missing, Err(CollectionServiceError::NotFound(_))));
}

#[tokio::test]
async fn can_list_collections_in_id_order() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);
    for id in ["sentinel", "landsat", "naip"] {
        service
            .create_collection(common::collection_document(id))
            .await
            .expect("Failed to create collection");
    }

    let ids: Vec<String> = service
        .all_collections()
        .await
        .expect("Failed to list collections")
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec!["landsat", "naip", "sentinel"]);
}

#[tokio::test]
async fn can_delete_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = CollectionService::new(&state.session);
    service
        .create_collection(common::collection_document("landsat"))
        .await
        .expect("Failed to create collection");

    let deleted = service
        .delete_collection("landsat")
        .await
        .expect("Failed to delete collection");
    assert_eq!(deleted.id, "landsat");

    assert!(matches!(
        service.get_collection("landsat").await,
        Err(CollectionServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_collection("landsat").await,
        Err(CollectionServiceError::NotFound(_))
    ));
}
