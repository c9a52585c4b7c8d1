//! Integration tests for the translation service
//!
//! These tests drive the public API end to end against the in-memory store:
//! first through `TranslationService`, then over HTTP via the axum router
//! bound to an ephemeral port.
//!
//! NOTE: PostgreSQL-backed tests live in src/store/postgres.rs and only run
//! when TEST_DATABASE_URL is set.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};
use translation_service::api::{self, AppState};
use translation_service::export::{self, ExportFile};
use translation_service::store::MemoryStore;
use translation_service::tags::TagName;
use translation_service::{
    AssignTags, CreateTranslation, ServiceError, Translation, TranslationService,
    UpdateTranslation, DELETED_MESSAGE,
};

// ==================== Test Helpers ====================

fn new_service() -> TranslationService {
    TranslationService::new(Arc::new(MemoryStore::new()))
}

fn names(translation: &Translation) -> BTreeSet<String> {
    translation.tags.iter().map(|t| t.name.clone()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Serve the router on 127.0.0.1:0 and return its base URL
async fn spawn_app(api_key: Option<&str>) -> String {
    let state = AppState::new(new_service(), api_key.map(str::to_string));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    format!("http://{}", addr)
}

// ==================== Service Workflow Tests ====================

#[tokio::test]
async fn test_create_then_get_returns_same_entity() {
    let service = new_service();
    let created = service
        .create_translation(CreateTranslation::new(
            "eng",
            "welcome_message",
            json!({"en": "Welcome", "es": "Bienvenido"}),
            &["greeting", "welcome"],
        ))
        .await
        .unwrap();

    let fetched = service.get_translation_by_id(created.id).await.unwrap();
    assert_eq!(fetched.locale, "eng");
    assert_eq!(fetched.key, "welcome_message");
    assert_eq!(fetched.content, created.content);
    assert_eq!(names(&fetched), set(&["greeting", "welcome"]));
}

#[tokio::test]
async fn test_duplicate_locale_key_conflicts() {
    let service = new_service();
    let input = CreateTranslation::new("en", "title", "Title", &[]);
    service.create_translation(input.clone()).await.unwrap();

    let err = service.create_translation(input).await.unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }));
}

#[tokio::test]
async fn test_update_replaces_then_assign_adds() {
    let service = new_service();
    let t = service
        .create_translation(CreateTranslation::new(
            "en",
            "hello",
            "Hello",
            &["greeting", "welcome"],
        ))
        .await
        .unwrap();

    let updated = service
        .update_translation(
            t.id,
            UpdateTranslation {
                tags: Some(vec!["formal".into()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&updated), set(&["formal"]));

    let assigned = service
        .assign_tags_to_translation(
            t.id,
            AssignTags {
                tags: vec!["casual".into()],
            },
        )
        .await
        .unwrap();
    assert_eq!(names(&assigned), set(&["casual", "formal"]));

    // The replaced tags still exist for other translations to use
    assert!(service
        .tags()
        .find(&TagName::parse("greeting").unwrap())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_search_and_tag_queries() {
    let service = new_service();
    service
        .create_translation(CreateTranslation::new("en", "greeting", "Welcome", &["home"]))
        .await
        .unwrap();
    service
        .create_translation(CreateTranslation::new("de", "farewell", "Tschüss", &[]))
        .await
        .unwrap();

    assert!(service.search_translations(Some("")).await.unwrap().is_empty());
    let hits = service.search_translations(Some("welcome")).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "greeting");
    assert_eq!(service.search_translations(Some("DE")).await.unwrap().len(), 1);
    assert_eq!(service.search_translations(Some("TSCHÜSS")).await.unwrap().len(), 1);

    assert!(service
        .get_translations_by_tag("nonexistent")
        .await
        .unwrap()
        .is_empty());
    assert_eq!(service.get_translations_by_tag("HOME").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_twice() {
    let service = new_service();
    let t = service
        .create_translation(CreateTranslation::new("en", "k", "v", &["shared"]))
        .await
        .unwrap();

    assert_eq!(service.delete_translation(t.id).await.unwrap(), DELETED_MESSAGE);
    assert!(matches!(
        service.delete_translation(t.id).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(service.get_translations_by_tag("shared").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_export_roundtrip_into_fresh_store() {
    let source = new_service();
    for (locale, key, tags) in [
        ("en", "a", vec!["x", "y"]),
        ("es", "a", vec!["x"]),
        ("en", "b", vec![]),
    ] {
        source
            .create_translation(CreateTranslation::new(locale, key, "text", &tags))
            .await
            .unwrap();
    }

    let snapshot = source.export_translations().await.unwrap();
    let target = new_service();
    let report = export::import(&target, &ExportFile::new(snapshot.clone()))
        .await
        .unwrap();
    assert_eq!(report.created, 3);

    let summarize = |list: Vec<Translation>| -> BTreeSet<(String, String, String, BTreeSet<String>)> {
        list.iter()
            .map(|t| {
                (
                    t.locale.clone(),
                    t.key.clone(),
                    t.content.as_value().to_string(),
                    names(t),
                )
            })
            .collect()
    };
    assert_eq!(
        summarize(snapshot),
        summarize(target.export_translations().await.unwrap())
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creations_share_one_tag() {
    let store = Arc::new(MemoryStore::new());
    let service = TranslationService::new(store.clone());

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create_translation(CreateTranslation::new(
                        "en",
                        &format!("key_{}", i),
                        "text",
                        &["shared-tag"],
                    ))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(store.tag_count().await, 1);
    assert_eq!(service.get_translations_by_tag("shared-tag").await.unwrap().len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assign_and_delete_leave_no_dangling_links() {
    let store = Arc::new(MemoryStore::new());
    let service = TranslationService::new(store.clone());
    let t = service
        .create_translation(CreateTranslation::new("en", "k", "v", &[]))
        .await
        .unwrap();
    let id = t.id;

    let assigners: Vec<_> = (0..10)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .assign_tags_to_translation(
                        id,
                        AssignTags {
                            tags: vec![format!("tag-{}", i)],
                        },
                    )
                    .await
            })
        })
        .collect();
    let deleter = {
        let service = service.clone();
        tokio::spawn(async move { service.delete_translation(id).await })
    };

    for result in futures::future::join_all(assigners).await {
        match result.unwrap() {
            Ok(_) | Err(ServiceError::NotFound(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    deleter.await.unwrap().unwrap();

    assert_eq!(store.link_count().await, 0);
}

// ==================== HTTP Tests ====================

#[tokio::test]
async fn test_http_crud_flow() {
    let base = spawn_app(None).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let created = client
        .post(format!("{}/api/translations", base))
        .json(&json!({
            "locale": "eng",
            "key": "welcome_message",
            "content": {"en": "Welcome", "es": "Bienvenido"},
            "tags": ["greeting", "welcome"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let created: Value = created.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["tags"].as_array().unwrap().len(), 2);

    let shown = client
        .get(format!("{}/api/translations/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(shown.status(), 200);

    let updated: Value = client
        .put(format!("{}/api/translations/{}", base, id))
        .json(&json!({"locale": "eng", "content": "Hi", "tags": ["formal"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["content"], "Hi");
    assert_eq!(updated["tags"][0]["name"], "formal");

    let assigned: Value = client
        .post(format!("{}/api/translations/{}/tags", base, id))
        .json(&json!({"tags": ["casual"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(assigned["tags"].as_array().unwrap().len(), 2);

    let by_tag: Value = client
        .get(format!("{}/api/translations/tags/casual", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_tag.as_array().unwrap().len(), 1);

    let search: Value = client
        .get(format!("{}/api/translations/search?query=hi", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(search.as_array().unwrap().len(), 1);

    let empty_search: Value = client
        .get(format!("{}/api/translations/search", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(empty_search.as_array().unwrap().is_empty());

    let exported: Value = client
        .get(format!("{}/api/translations/export", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 1);

    let deleted = client
        .delete(format!("{}/api/translations/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    let body: Value = deleted.json().await.unwrap();
    assert_eq!(body["message"], "Translation deleted successfully");

    let again = client
        .delete(format!("{}/api/translations/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_http_error_statuses() {
    let base = spawn_app(None).await;
    let client = reqwest::Client::new();

    let invalid = client
        .post(format!("{}/api/translations", base))
        .json(&json!({"locale": "en", "tags": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 422);
    let body: Value = invalid.json().await.unwrap();
    assert!(body["errors"]["key"].is_array());
    assert!(body["errors"]["content"].is_array());

    let payload = json!({"locale": "en", "key": "k", "content": "v", "tags": []});
    let first = client
        .post(format!("{}/api/translations", base))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 201);
    let id = first.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let duplicate = client
        .post(format!("{}/api/translations", base))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    let rename = client
        .put(format!("{}/api/translations/{}", base, id))
        .json(&json!({"key": "renamed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(rename.status(), 422);

    let missing = client
        .get(format!("{}/api/translations/9999", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let missing_assign = client
        .post(format!("{}/api/translations/9999/tags", base))
        .json(&json!({"tags": ["a"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_assign.status(), 404);
}

#[tokio::test]
async fn test_http_api_key_gate() {
    let base = spawn_app(Some("test-api-key")).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/translations", base);

    let anonymous = client.get(&url).send().await.unwrap();
    assert_eq!(anonymous.status(), 401);

    let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), 401);

    let ok = client.get(&url).bearer_auth("test-api-key").send().await.unwrap();
    assert_eq!(ok.status(), 200);

    // Health stays public
    let health = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(health.status(), 200);
}
