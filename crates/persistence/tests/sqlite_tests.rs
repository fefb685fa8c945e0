//! SQLite backend integration tests.
//!
//! These tests exercise the SQLite backend through the `ResourceStorage` trait.

use serde_json::{Map, Value, json};

use storefront_persistence::backends::sqlite::SqliteBackend;
use storefront_persistence::core::ResourceStorage;
use storefront_persistence::error::{ResourceError, StorageError, ValidationError};
use storefront_persistence::types::{
    FilterClause, FilterOperator, ListQuery, SortDirective, StoredRecord,
};

fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

fn attrs(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("attributes must be an object")
}

async fn create_shop(backend: &SqliteBackend, name: &str) -> StoredRecord {
    backend
        .create("shops", attrs(json!({ "name": name })))
        .await
        .expect("create shop")
}

async fn create_seller(backend: &SqliteBackend, user_id: i64) -> StoredRecord {
    backend
        .create("sellers", attrs(json!({ "user_id": user_id })))
        .await
        .expect("create seller")
}

fn ids(records: &[StoredRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id()).collect()
}

// ============================================================================
// Create / Read Tests
// ============================================================================

#[tokio::test]
async fn test_create_assigns_sequential_ids() {
    let backend = create_backend();
    let first = create_shop(&backend, "First").await;
    let second = create_shop(&backend, "Second").await;
    assert_eq!(first.id(), "1");
    assert_eq!(second.id(), "2");
}

#[tokio::test]
async fn test_attributes_in_declaration_order() {
    let backend = create_backend();
    let user = backend
        .create(
            "users",
            attrs(json!({"password": "hash", "email": "a@b.test", "name": "Ann"})),
        )
        .await
        .unwrap();
    let keys: Vec<_> = user.attributes().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["name", "email", "password", "created_at", "updated_at", "deleted_at"]
    );
}

#[tokio::test]
async fn test_brands_have_no_timestamps() {
    let backend = create_backend();
    let brand = backend
        .create("brands", attrs(json!({"name": "Acme"})))
        .await
        .unwrap();
    assert_eq!(brand.attributes().len(), 1);
    assert!(brand.attribute("created_at").is_none());
}

#[tokio::test]
async fn test_unsupported_resource_type() {
    let backend = create_backend();
    let err = backend.find("orders", "1").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::UnsupportedResourceType { .. })
    ));
}

#[tokio::test]
async fn test_find_or_fail() {
    let backend = create_backend();
    let err = backend.find_or_fail("shops", "42").await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Resource(ResourceError::NotFound { ref resource_type, ref id })
            if resource_type == "shops" && id == "42"
    ));
}

// ============================================================================
// List Tests
// ============================================================================

#[tokio::test]
async fn test_list_sorting() {
    let backend = create_backend();
    for name in ["Bravo", "Alpha", "Charlie"] {
        create_shop(&backend, name).await;
    }

    let page = backend
        .list("shops", &ListQuery::new().with_sort(SortDirective::parse("name")))
        .await
        .unwrap();
    let names: Vec<_> = page
        .records
        .iter()
        .map(|r| r.attribute("name").unwrap().as_str().unwrap())
        .collect();
    assert_eq!(names, ["Alpha", "Bravo", "Charlie"]);

    let page = backend
        .list("shops", &ListQuery::new().with_sort(SortDirective::parse("-name")))
        .await
        .unwrap();
    assert_eq!(ids(&page.records), ["3", "1", "2"]);
}

#[tokio::test]
async fn test_list_multi_key_sort_with_id_tiebreak() {
    let backend = create_backend();
    for name in ["Same", "Other", "Same"] {
        create_shop(&backend, name).await;
    }
    let query = ListQuery::new()
        .with_sort(SortDirective::parse("-name"))
        .with_sort(SortDirective::parse("created_at"));
    let page = backend.list("shops", &query).await.unwrap();
    assert_eq!(ids(&page.records), ["1", "3", "2"]);
}

#[tokio::test]
async fn test_list_filters() {
    let backend = create_backend();
    for name in ["Corner Store", "Corner Cafe", "Market"] {
        create_shop(&backend, name).await;
    }

    let query =
        ListQuery::new().with_filter(FilterClause::new("name", FilterOperator::Like, "Corner%"));
    let page = backend.list("shops", &query).await.unwrap();
    assert_eq!(page.total, 2);

    let query = ListQuery::new().with_filter(FilterClause::any_of(
        "id",
        vec!["1".to_string(), "3".to_string()],
    ));
    let page = backend.list("shops", &query).await.unwrap();
    assert_eq!(ids(&page.records), ["1", "3"]);

    let query = ListQuery::new().with_filter(FilterClause::new("id", FilterOperator::Gt, "1"));
    let page = backend.list("shops", &query).await.unwrap();
    assert_eq!(ids(&page.records), ["2", "3"]);
}

#[tokio::test]
async fn test_list_boolean_filter() {
    let backend = create_backend();
    backend
        .create("employees", attrs(json!({"user_id": 1, "is_active": true})))
        .await
        .unwrap();
    backend
        .create("employees", attrs(json!({"user_id": 2, "is_active": false})))
        .await
        .unwrap();
    let query =
        ListQuery::new().with_filter(FilterClause::new("is_active", FilterOperator::Eq, "true"));
    let page = backend.list("employees", &query).await.unwrap();
    assert_eq!(ids(&page.records), ["1"]);
}

#[tokio::test]
async fn test_list_page_window_and_total() {
    let backend = create_backend();
    for i in 0..12 {
        create_shop(&backend, &format!("Shop {:02}", i)).await;
    }
    let query = ListQuery::new().with_page(5, 10);
    let page = backend.list("shops", &query).await.unwrap();
    assert_eq!(page.total, 12);
    assert_eq!(ids(&page.records), ["11", "12"]);
}

#[tokio::test]
async fn test_list_rejects_unknown_sort_column() {
    let backend = create_backend();
    let query = ListQuery::new().with_sort(SortDirective::parse("created_at"));
    let err = backend.list("brands", &query).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::UnknownColumn { .. })
    ));
}

// ============================================================================
// Relationship Tests
// ============================================================================

#[tokio::test]
async fn test_sync_to_many_replaces_links() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    for i in 1..=6 {
        create_shop(&backend, &format!("Shop {}", i)).await;
    }

    let initial: Vec<String> = (1..=5).map(|i| i.to_string()).collect();
    backend.sync_to_many(&seller, "shops", &initial).await.unwrap();
    let shops = backend.related(&seller, "shops").await.unwrap();
    assert_eq!(ids(&shops), ["1", "2", "3", "4", "5"]);

    backend
        .sync_to_many(&seller, "shops", &["5".to_string(), "6".to_string()])
        .await
        .unwrap();
    let shops = backend.related(&seller, "shops").await.unwrap();
    assert_eq!(ids(&shops), ["5", "6"]);

    backend.sync_to_many(&seller, "shops", &[]).await.unwrap();
    assert!(backend.related(&seller, "shops").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_to_many_is_all_or_nothing() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    for i in 1..=5 {
        create_shop(&backend, &format!("Shop {}", i)).await;
    }
    let initial: Vec<String> = (1..=5).map(|i| i.to_string()).collect();
    backend.sync_to_many(&seller, "shops", &initial).await.unwrap();

    let err = backend
        .sync_to_many(&seller, "shops", &["5".to_string(), "6".to_string()])
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let shops = backend.related(&seller, "shops").await.unwrap();
    assert_eq!(ids(&shops), ["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_sync_to_many_collapses_duplicates_and_is_idempotent() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    create_shop(&backend, "One").await;
    create_shop(&backend, "Two").await;

    let payload = vec!["2".to_string(), "1".to_string(), "2".to_string()];
    backend.sync_to_many(&seller, "shops", &payload).await.unwrap();
    let first = backend.related(&seller, "shops").await.unwrap();
    backend.sync_to_many(&seller, "shops", &payload).await.unwrap();
    let second = backend.related(&seller, "shops").await.unwrap();

    assert_eq!(ids(&first), ["1", "2"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_sync_rejects_soft_deleted_target() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    let shop = create_shop(&backend, "Gone").await;
    backend.delete(&shop).await.unwrap();

    let err = backend
        .sync_to_many(&seller, "shops", &[shop.id().to_string()])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_inverse_relation_sees_links() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    let shop = create_shop(&backend, "Shared").await;
    backend
        .sync_to_many(&seller, "shops", &[shop.id().to_string()])
        .await
        .unwrap();

    let sellers = backend.related(&shop, "sellers").await.unwrap();
    assert_eq!(ids(&sellers), ["1"]);
}

#[tokio::test]
async fn test_to_one_relation() {
    let backend = create_backend();
    let user = backend
        .create(
            "users",
            attrs(json!({"name": "Ann", "email": "ann@example.test", "password": "x"})),
        )
        .await
        .unwrap();
    let seller = create_seller(&backend, 99).await;
    assert!(backend.related(&seller, "users").await.unwrap().is_empty());

    backend
        .set_to_one(&seller, "users", Some(user.id()))
        .await
        .unwrap();
    let users = backend.related(&seller, "users").await.unwrap();
    assert_eq!(ids(&users), [user.id()]);

    let reloaded = backend.find("sellers", seller.id()).await.unwrap().unwrap();
    assert_eq!(reloaded.attribute("user_id"), Some(&json!(1)));
}

// ============================================================================
// Delete / Restore Tests
// ============================================================================

#[tokio::test]
async fn test_soft_delete_hides_record() {
    let backend = create_backend();
    let shop = create_shop(&backend, "Hidden").await;
    backend.delete(&shop).await.unwrap();

    assert!(backend.find("shops", shop.id()).await.unwrap().is_none());
    let page = backend.list("shops", &ListQuery::new()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_seller_delete_cascades_to_shops_and_restore_undoes_it() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    for i in 1..=3 {
        create_shop(&backend, &format!("Shop {}", i)).await;
    }
    let unrelated = create_shop(&backend, "Elsewhere").await;
    backend
        .sync_to_many(&seller, "shops", &["1".to_string(), "2".to_string(), "3".to_string()])
        .await
        .unwrap();

    backend.delete(&seller).await.unwrap();
    for id in ["1", "2", "3"] {
        assert!(backend.find("shops", id).await.unwrap().is_none());
    }
    assert!(backend.find("shops", unrelated.id()).await.unwrap().is_some());

    let restored = backend.restore("sellers", seller.id()).await.unwrap();
    assert!(!restored.is_deleted());
    for id in ["1", "2", "3"] {
        assert!(backend.find("shops", id).await.unwrap().is_some());
    }
    let shops = backend.related(&restored, "shops").await.unwrap();
    assert_eq!(ids(&shops), ["1", "2", "3"]);
}

#[tokio::test]
async fn test_restore_leaves_independently_deleted_children() {
    let backend = create_backend();
    let seller = create_seller(&backend, 1).await;
    let kept = create_shop(&backend, "Kept").await;
    let dropped = create_shop(&backend, "Dropped").await;
    backend
        .sync_to_many(&seller, "shops", &[kept.id().to_string(), dropped.id().to_string()])
        .await
        .unwrap();

    // Deleted on its own before the seller goes.
    backend.delete(&dropped).await.unwrap();
    backend.delete(&seller).await.unwrap();
    backend.restore("sellers", seller.id()).await.unwrap();

    assert!(backend.find("shops", kept.id()).await.unwrap().is_some());
    assert!(backend.find("shops", dropped.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_hard_delete_removes_pivot_rows() {
    let backend = create_backend();
    let product = backend
        .create("products", attrs(json!({"name": "Widget"})))
        .await
        .unwrap();
    let shop = create_shop(&backend, "Store").await;
    backend
        .sync_to_many(&shop, "products", &[product.id().to_string()])
        .await
        .unwrap();

    backend.delete(&product).await.unwrap();
    assert!(backend.related(&shop, "products").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_unknown_record() {
    let backend = create_backend();
    let err = backend.restore("sellers", "5").await.unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Uniqueness Tests
// ============================================================================

#[tokio::test]
async fn test_is_taken_coerces_to_column_type() {
    let backend = create_backend();
    let seller = create_seller(&backend, 7).await;

    assert!(backend
        .is_taken("sellers", "user_id", &json!("7"), None)
        .await
        .unwrap());
    assert!(!backend
        .is_taken("sellers", "user_id", &json!("7"), Some(seller.id()))
        .await
        .unwrap());
    assert!(!backend
        .is_taken("sellers", "user_id", &json!("seven"), None)
        .await
        .unwrap());
}

// ============================================================================
// File Backend Tests
// ============================================================================

#[tokio::test]
async fn test_file_backend_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storefront.db");

    {
        let backend = SqliteBackend::open(&path).unwrap();
        backend.init_schema().unwrap();
        create_shop(&backend, "Durable").await;
    }

    let backend = SqliteBackend::open(&path).unwrap();
    backend.init_schema().unwrap();
    let shop = backend.find("shops", "1").await.unwrap().unwrap();
    assert_eq!(shop.attribute("name"), Some(&json!("Durable")));
}
