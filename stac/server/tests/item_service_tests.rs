use stac_server::collection::CollectionService;
use stac_server::item::{ItemService, ItemServiceError};
use stac_server::session::Session;
use testcontainers_modules::{postgres, testcontainers};

mod common;

const EVERYWHERE: [f64; 4] = [-10.0, -10.0, 10.0, 10.0];

pub struct TestContext {
    #[allow(dead_code)] // container is kept to ensure it's not dropped
    pub container: testcontainers::ContainerAsync<postgres::Postgres>,
    pub session: Session,
}

/// Starts a database holding one empty `landsat` collection.
async fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let container = common::setup_container().await?;
    let db = common::setup_db(&container).await?;
    let session = Session::single(db);
    CollectionService::new(&session)
        .create_collection(common::collection_document("landsat"))
        .await?;
    Ok(TestContext { session, container })
}

#[tokio::test]
async fn can_create_and_get_item() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);

    let created = service
        .create_item(
            "landsat",
            common::item_document("landsat", "scene-1", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await
        .expect("Failed to create item");
    assert_eq!(created.collection_id, "landsat");
    assert_eq!(created.bbox_xmin, Some(-10.0));
    assert!(created.properties.get("created").is_some());

    let fetched = service
        .get_item("landsat", "scene-1")
        .await
        .expect("Failed to get item");
    assert_eq!(fetched.id, "scene-1");
    assert_eq!(fetched.datetime, created.datetime);
}

#[tokio::test]
async fn rejects_item_for_missing_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);

    let result = service
        .create_item(
            "sentinel",
            common::item_document("sentinel", "scene-1", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await;
    assert!(matches!(
        result,
        Err(ItemServiceError::CollectionNotFound(id)) if id == "sentinel"
    ));
}

#[tokio::test]
async fn rejects_duplicate_and_mismatched_items() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    let document = common::item_document("landsat", "scene-1", "2020-06-01T00:00:00Z", EVERYWHERE);
    service
        .create_item("landsat", document.clone())
        .await
        .expect("Failed to create item");

    assert!(matches!(
        service.create_item("landsat", document.clone()).await,
        Err(ItemServiceError::AlreadyExists(_, _))
    ));
    assert!(matches!(
        service
            .update_item("landsat", "scene-2", document)
            .await,
        Err(ItemServiceError::Mismatch(_))
    ));
}

#[tokio::test]
async fn reports_conflict_for_concurrent_duplicate_creates() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);

    for round in 0..5 {
        let id = format!("scene-{}", round);
        let document = common::item_document("landsat", &id, "2020-06-01T00:00:00Z", EVERYWHERE);
        let (first, second) = tokio::join!(
            service.create_item("landsat", document.clone()),
            service.create_item("landsat", document),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(ItemServiceError::AlreadyExists(collection, item)) if collection == "landsat" && *item == id
        )));
    }
}

#[tokio::test]
async fn skips_items_inserted_by_concurrent_bulk_requests() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    let documents: Vec<_> = (0..20)
        .map(|n| {
            common::item_document("landsat", &format!("bulk-{}", n), "2020-06-01T00:00:00Z", EVERYWHERE)
        })
        .collect();

    let (first, second) = tokio::join!(
        service.bulk_create_items("landsat", documents.clone()),
        service.bulk_create_items("landsat", documents),
    );
    let first = first.expect("Failed to bulk insert");
    let second = second.expect("Failed to bulk insert");

    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert!(second.errors.is_empty(), "{:?}", second.errors);
    assert_eq!(first.created + second.created, 20);
    assert_eq!(first.skipped + second.skipped, 20);
}

#[tokio::test]
async fn can_update_item_keeping_created_stamp() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    let created = service
        .create_item(
            "landsat",
            common::item_document("landsat", "scene-1", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await
        .expect("Failed to create item");

    let replacement =
        common::item_document("landsat", "scene-1", "2021-06-01T00:00:00Z", [0.0, 0.0, 1.0, 1.0]);
    let updated = service
        .update_item("landsat", "scene-1", replacement)
        .await
        .expect("Failed to update item");

    assert_eq!(
        updated.properties.get("created"),
        created.properties.get("created")
    );
    assert_eq!(updated.bbox_xmax, Some(1.0));
    assert_ne!(updated.datetime, created.datetime);
}

#[tokio::test]
async fn can_page_through_items() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    for id in ["c", "a", "b"] {
        service
            .create_item(
                "landsat",
                common::item_document("landsat", id, "2020-06-01T00:00:00Z", EVERYWHERE),
            )
            .await
            .expect("Failed to create item");
    }

    let first = service
        .item_collection("landsat", 2, 0)
        .await
        .expect("Failed to list items");
    let ids: Vec<&str> = first.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(first.matched, 3);
    assert_eq!(first.next_token().as_deref(), Some("next:2"));

    let second = service
        .item_collection("landsat", 2, 2)
        .await
        .expect("Failed to list items");
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.next_token(), None);
}

#[tokio::test]
async fn can_bulk_insert_skipping_existing() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    service
        .create_item(
            "landsat",
            common::item_document("landsat", "a", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await
        .expect("Failed to create item");

    let mut broken = common::item_document("landsat", "c", "2020-06-01T00:00:00Z", EVERYWHERE);
    broken.properties.remove("datetime");
    let outcome = service
        .bulk_create_items(
            "landsat",
            vec![
                common::item_document("landsat", "a", "2020-06-01T00:00:00Z", EVERYWHERE),
                common::item_document("landsat", "b", "2020-06-01T00:00:00Z", EVERYWHERE),
                broken,
            ],
        )
        .await
        .expect("Failed to bulk insert");

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.errors.len(), 1);
}

#[tokio::test]
async fn can_delete_items_with_their_collection() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    service
        .create_item(
            "landsat",
            common::item_document("landsat", "a", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await
        .expect("Failed to create item");

    CollectionService::new(&state.session)
        .delete_collection("landsat")
        .await
        .expect("Failed to delete collection");

    assert!(matches!(
        service.get_item("landsat", "a").await,
        Err(ItemServiceError::NotFound(_, _))
    ));
}

#[tokio::test]
async fn can_delete_item() {
    let state = setup().await.expect("Failed to setup test context");
    let service = ItemService::new(&state.session);
    service
        .create_item(
            "landsat",
            common::item_document("landsat", "a", "2020-06-01T00:00:00Z", EVERYWHERE),
        )
        .await
        .expect("Failed to create item");

    let deleted = service
        .delete_item("landsat", "a")
        .await
        .expect("Failed to delete item");
    assert_eq!(deleted.id, "a");
    assert!(matches!(
        service.delete_item("landsat", "a").await,
        Err(ItemServiceError::NotFound(_, _))
    ));
}
