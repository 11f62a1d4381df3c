//! Storage integration tests
//!
//! Exercises the storage trait contract against the SQLite backend:
//! uniqueness, resolvable filtering, the atomic visit update and
//! owner-scoped soft deletes.

use std::sync::Arc;

use tern::analytics::VisitRecord;
use tern::models::NewMapping;
use tern::storage::{SqliteStorage, Storage, StorageError};

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_mapping(short_code: &str, original_url: &str, owner_id: Option<&str>) -> NewMapping {
    NewMapping {
        short_code: short_code.to_string(),
        original_url: original_url.to_string(),
        owner_id: owner_id.map(str::to_string),
        created_at: now(),
        expires_at: None,
        title: None,
        description: None,
        tags: None,
    }
}

fn visit_at(visited_at: i64) -> VisitRecord {
    VisitRecord {
        visited_at,
        ip: "198.51.100.7".to_string(),
        user_agent: "test-agent".to_string(),
        referrer: None,
    }
}

#[tokio::test]
async fn insert_and_find_round_trip() {
    let storage = create_test_storage().await;

    let mut mapping = new_mapping("roundtrip", "https://example.com/a", Some("alice"));
    mapping.title = Some("Example".to_string());
    mapping.tags = Some(vec!["work".to_string(), "docs".to_string()]);

    let created = storage.insert(&mapping).await.unwrap();
    assert_eq!(created.short_code, "roundtrip");
    assert_eq!(created.clicks, 0);
    assert!(created.is_active);
    assert_eq!(created.last_accessed, None);

    let found = storage.find_by_code("roundtrip").await.unwrap().unwrap();
    assert_eq!(found.original_url, "https://example.com/a");
    assert_eq!(found.owner_id.as_deref(), Some("alice"));
    assert_eq!(found.title.as_deref(), Some("Example"));
    assert_eq!(
        found.tags,
        Some(vec!["work".to_string(), "docs".to_string()])
    );
}

#[tokio::test]
async fn insert_conflicts_on_duplicate_code() {
    let storage = create_test_storage().await;

    storage
        .insert(&new_mapping("taken", "https://example.com/a", None))
        .await
        .unwrap();

    let err = storage
        .insert(&new_mapping("taken", "https://example.com/b", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn soft_deleted_code_still_conflicts() {
    let storage = create_test_storage().await;

    storage
        .insert(&new_mapping("ghost", "https://example.com/a", None))
        .await
        .unwrap();
    assert!(storage.soft_delete("ghost", None).await.unwrap());

    // The code remains assigned even though its mapping is inactive.
    let err = storage
        .insert(&new_mapping("ghost", "https://example.com/b", None))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn find_resolvable_filters_inactive_and_expired() {
    let storage = create_test_storage().await;
    let current = now();

    storage
        .insert(&new_mapping("active", "https://example.com/1", None))
        .await
        .unwrap();

    let mut expired = new_mapping("expired", "https://example.com/2", None);
    expired.expires_at = Some(current - 10);
    storage.insert(&expired).await.unwrap();

    let mut future = new_mapping("future", "https://example.com/3", None);
    future.expires_at = Some(current + 3600);
    storage.insert(&future).await.unwrap();

    storage
        .insert(&new_mapping("deleted", "https://example.com/4", None))
        .await
        .unwrap();
    storage.soft_delete("deleted", None).await.unwrap();

    assert!(storage
        .find_resolvable("active", current)
        .await
        .unwrap()
        .is_some());
    assert!(storage
        .find_resolvable("future", current)
        .await
        .unwrap()
        .is_some());
    assert!(storage
        .find_resolvable("expired", current)
        .await
        .unwrap()
        .is_none());
    assert!(storage
        .find_resolvable("deleted", current)
        .await
        .unwrap()
        .is_none());

    // The rows are still present in storage.
    assert!(storage.find_by_code("expired").await.unwrap().is_some());
    assert!(storage.find_by_code("deleted").await.unwrap().is_some());
}

#[tokio::test]
async fn find_by_original_url_is_owner_scoped() {
    let storage = create_test_storage().await;
    let current = now();

    storage
        .insert(&new_mapping(
            "alice1",
            "https://example.com/shared",
            Some("alice"),
        ))
        .await
        .unwrap();
    storage
        .insert(&new_mapping("anon1", "https://example.com/shared", None))
        .await
        .unwrap();

    let found = storage
        .find_by_original_url("https://example.com/shared", "alice", current)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.short_code, "alice1");

    assert!(storage
        .find_by_original_url("https://example.com/shared", "bob", current)
        .await
        .unwrap()
        .is_none());

    // Soft-deleted mappings are not idempotent-create matches.
    storage.soft_delete("alice1", Some("alice")).await.unwrap();
    assert!(storage
        .find_by_original_url("https://example.com/shared", "alice", current)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn record_visit_updates_counters_and_appends() {
    let storage = create_test_storage().await;
    let current = now();

    storage
        .insert(&new_mapping("counted", "https://example.com", None))
        .await
        .unwrap();

    let updated = storage
        .record_visit("counted", &visit_at(current), current)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.clicks, 1);
    assert_eq!(updated.last_accessed, Some(current));

    let updated = storage
        .record_visit("counted", &visit_at(current + 1), current + 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.clicks, 2);
    assert_eq!(updated.last_accessed, Some(current + 1));

    let visits = storage.visits_for_code("counted").await.unwrap();
    assert_eq!(visits.len(), 2);
    // Oldest first
    assert_eq!(visits[0].visited_at, current);
    assert_eq!(visits[1].visited_at, current + 1);
}

#[tokio::test]
async fn record_visit_skips_unresolvable_mappings() {
    let storage = create_test_storage().await;
    let current = now();

    let mut expired = new_mapping("gone", "https://example.com", None);
    expired.expires_at = Some(current - 5);
    storage.insert(&expired).await.unwrap();

    let result = storage
        .record_visit("gone", &visit_at(current), current)
        .await
        .unwrap();
    assert!(result.is_none());

    let result = storage
        .record_visit("never-existed", &visit_at(current), current)
        .await
        .unwrap();
    assert!(result.is_none());

    // No visit rows were appended for the failed updates.
    assert!(storage.visits_for_code("gone").await.unwrap().is_empty());

    let mapping = storage.find_by_code("gone").await.unwrap().unwrap();
    assert_eq!(mapping.clicks, 0);
}

#[tokio::test]
async fn record_visit_stores_request_metadata() {
    let storage = create_test_storage().await;
    let current = now();

    storage
        .insert(&new_mapping("meta", "https://example.com", None))
        .await
        .unwrap();

    let visit = VisitRecord {
        visited_at: current,
        ip: "203.0.113.9".to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        referrer: Some("https://news.example".to_string()),
    };
    storage
        .record_visit("meta", &visit, current)
        .await
        .unwrap()
        .unwrap();

    let visits = storage.visits_for_code("meta").await.unwrap();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].ip, "203.0.113.9");
    assert_eq!(visits[0].user_agent, "Mozilla/5.0");
    assert_eq!(visits[0].referrer.as_deref(), Some("https://news.example"));
}

#[tokio::test]
async fn soft_delete_is_owner_scoped() {
    let storage = create_test_storage().await;

    storage
        .insert(&new_mapping("owned", "https://example.com", Some("alice")))
        .await
        .unwrap();

    // Anonymous requester cannot delete an owned mapping.
    assert!(!storage.soft_delete("owned", None).await.unwrap());
    // Neither can a different owner.
    assert!(!storage.soft_delete("owned", Some("bob")).await.unwrap());

    assert!(storage.soft_delete("owned", Some("alice")).await.unwrap());

    // Deleting twice reports no transition.
    assert!(!storage.soft_delete("owned", Some("alice")).await.unwrap());

    let mapping = storage.find_by_code("owned").await.unwrap().unwrap();
    assert!(!mapping.is_active);
}

#[tokio::test]
async fn anonymous_mappings_are_deletable_without_identity() {
    let storage = create_test_storage().await;

    storage
        .insert(&new_mapping("anon", "https://example.com", None))
        .await
        .unwrap();

    assert!(storage.soft_delete("anon", None).await.unwrap());
}

#[tokio::test]
async fn list_scopes_and_paginates_newest_first() {
    let storage = create_test_storage().await;
    let base = now();

    for i in 0..3 {
        let mut mapping = new_mapping(
            &format!("alice{i}"),
            &format!("https://example.com/{i}"),
            Some("alice"),
        );
        mapping.created_at = base + i;
        storage.insert(&mapping).await.unwrap();
    }

    let mut anon = new_mapping("anon0", "https://example.com/anon", None);
    anon.created_at = base;
    storage.insert(&anon).await.unwrap();

    let listed = storage.list(Some("alice"), 10, 0).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].short_code, "alice2");
    assert_eq!(listed[2].short_code, "alice0");

    let listed = storage.list(None, 10, 0).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, "anon0");

    let page = storage.list(Some("alice"), 2, 1).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].short_code, "alice1");
}

#[tokio::test]
async fn set_title_backfills_metadata() {
    let storage = create_test_storage().await;

    storage
        .insert(&new_mapping("untitled", "https://example.com", None))
        .await
        .unwrap();

    storage
        .set_title("untitled", "Example Domain")
        .await
        .unwrap();

    let mapping = storage.find_by_code("untitled").await.unwrap().unwrap();
    assert_eq!(mapping.title.as_deref(), Some("Example Domain"));
}
