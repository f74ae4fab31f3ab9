//! Post service tests against the in-memory database.

#![allow(clippy::unwrap_used)]

use quill_blog::{BlogConfig, BlogError, Post, PostDraft, PostService, PostStatus};
use quill_session::mocks::{MockDocumentDatabase, MockIdentityProvider, MockLocalStorage};
use quill_session::{
    AuthFacade, Document, Identity, IdentityId, Profile, SessionEnvironment, SessionError, SessionStore,
};
use quill_testing::test_clock;
use serde_json::{json, Value};

type TestStore = SessionStore<MockIdentityProvider, MockDocumentDatabase>;

fn doc(value: Value) -> Document {
    match value {
        Value::Object(fields) => fields,
        _ => Document::new(),
    }
}

fn setup() -> (MockDocumentDatabase, PostService<MockDocumentDatabase>, TestStore) {
    quill_testing::helpers::init_tracing();
    let database = MockDocumentDatabase::new().with_clock(test_clock());
    let store = SessionStore::new(
        SessionEnvironment::new(MockIdentityProvider::new(), database.clone()),
        MockLocalStorage::new(),
    );
    let posts = PostService::new(database.clone(), BlogConfig::default());
    (database, posts, store)
}

async fn sign_in(store: &TestStore, identity: Identity, profile: Option<Value>) -> AuthFacade {
    let id = identity.id.clone();
    store.set_identity(identity).await.unwrap();
    if let Some(fields) = profile {
        store.update_profile(Profile::new(id, doc(fields))).await.unwrap();
    }
    store.auth()
}

fn stored_post(database: &MockDocumentDatabase, id: &str) -> Post {
    Post::from_document(id, database.document("posts", id).unwrap()).unwrap()
}

#[tokio::test]
async fn creating_requires_sign_in() {
    let (database, posts, store) = setup();

    let result = posts.save_post(&store.auth(), &PostDraft::new("T", "C"), None).await;

    assert_eq!(result, Err(BlogError::NotSignedIn));
    assert_eq!(database.write_calls(), 0);
}

#[tokio::test]
async fn blank_draft_is_rejected_before_writing() {
    let (database, posts, store) = setup();
    let auth = sign_in(&store, Identity::new("u1"), None).await;

    let result = posts.save_post(&auth, &PostDraft::new("", "C"), None).await;

    assert!(matches!(result, Err(BlogError::InvalidDraft(_))));
    assert_eq!(database.write_calls(), 0);
}

#[tokio::test]
async fn created_post_has_derived_fields_and_fresh_counters() {
    let (database, posts, store) = setup();
    let auth = sign_in(
        &store,
        Identity::new("u1").with_email("ada@example.com"),
        Some(json!({ "role": "author", "displayName": "Ada" })),
    )
    .await;

    let draft = PostDraft::new("Hello, World!", "Some body text")
        .with_tags("rust, , web ")
        .with_status(PostStatus::Published);
    let id = posts.save_post(&auth, &draft, None).await.unwrap();

    let post = stored_post(&database, &id);
    assert_eq!(post.slug, "hello-world");
    assert_eq!(post.excerpt, "Some body text...");
    assert_eq!(post.tags, vec!["rust", "web"]);
    assert_eq!(post.author_id.as_str(), "u1");
    assert_eq!(post.author_name, "Ada");
    assert_eq!(post.view_count, 0);
    assert!(post.likes.is_empty());
    assert!(post.published_at.is_some());
    assert!(post.updated_at.is_some());
}

#[tokio::test]
async fn author_name_falls_back_to_email() {
    let (database, posts, store) = setup();
    let auth = sign_in(&store, Identity::new("u1").with_email("ada@example.com"), None).await;

    let id = posts.save_post(&auth, &PostDraft::new("T", "C"), None).await.unwrap();

    let post = stored_post(&database, &id);
    assert_eq!(post.author_name, "ada@example.com");
    assert_eq!(post.status, PostStatus::Draft);
    assert!(post.published_at.is_none());
}

#[tokio::test]
async fn empty_display_name_falls_back_to_email() {
    let (database, posts, store) = setup();
    let auth = sign_in(
        &store,
        Identity::new("u1").with_email("ada@example.com"),
        Some(json!({ "role": "author", "displayName": "" })),
    )
    .await;

    let id = posts.save_post(&auth, &PostDraft::new("T", "C"), None).await.unwrap();

    assert_eq!(stored_post(&database, &id).author_name, "ada@example.com");
}

#[tokio::test]
async fn update_keeps_author_and_counters() {
    let (database, posts, store) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({
            "title": "Old", "content": "Old body", "authorId": "u1", "authorName": "Ada",
            "status": "draft", "viewCount": 7, "likes": ["u2"],
        })),
    );
    let existing = stored_post(&database, "p1");
    let auth = sign_in(&store, Identity::new("u1"), None).await;

    let draft = PostDraft::new("New", "New body").with_status(PostStatus::Published);
    let id = posts.save_post(&auth, &draft, Some(&existing)).await.unwrap();

    assert_eq!(id, "p1");
    let post = stored_post(&database, "p1");
    assert_eq!(post.title, "New");
    assert_eq!(post.author_name, "Ada");
    assert_eq!(post.view_count, 7);
    assert_eq!(post.likes.len(), 1);
    assert!(post.is_published());
}

#[tokio::test]
async fn only_author_or_admin_may_edit() {
    let (database, posts, store) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({ "title": "T", "content": "C", "authorId": "u1" })),
    );
    let existing = stored_post(&database, "p1");
    let draft = PostDraft::new("Edited", "C");

    let auth = sign_in(&store, Identity::new("u2"), Some(json!({ "role": "author" }))).await;
    assert_eq!(
        posts.save_post(&auth, &draft, Some(&existing)).await,
        Err(BlogError::NotPostAuthor("p1".to_string()))
    );
    assert_eq!(database.write_calls(), 0);

    let auth = sign_in(&store, Identity::new("u3"), Some(json!({ "role": "admin" }))).await;
    posts.save_post(&auth, &draft, Some(&existing)).await.unwrap();
    assert_eq!(stored_post(&database, "p1").title, "Edited");
    assert_eq!(stored_post(&database, "p1").author_id.as_str(), "u1");
}

#[tokio::test]
async fn list_published_is_newest_first_and_paged() {
    let (database, _, _) = setup();
    let posts = PostService::new(database.clone(), BlogConfig::default().with_page_size(2));
    for (id, status, day) in [
        ("p1", "published", "01"),
        ("p2", "published", "03"),
        ("p3", "draft", "04"),
        ("p4", "published", "02"),
    ] {
        database.insert(
            "posts",
            id,
            doc(json!({
                "title": id, "content": "C", "authorId": "u1", "status": status,
                "publishedAt": format!("2025-01-{day}T00:00:00Z"),
            })),
        );
    }

    let listed: Vec<String> = posts
        .list_published()
        .await
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect();

    assert_eq!(listed, vec!["p2", "p4"]);
}

#[tokio::test]
async fn malformed_posts_are_skipped_in_listings() {
    let (database, posts, _) = setup();
    database.insert(
        "posts",
        "good",
        doc(json!({
            "title": "T", "content": "C", "authorId": "u1", "status": "published",
            "publishedAt": "2025-01-01T00:00:00Z",
        })),
    );
    database.insert(
        "posts",
        "bad",
        doc(json!({ "status": "published", "publishedAt": "2025-01-02T00:00:00Z" })),
    );

    let listed = posts.list_published().await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "good");
}

#[tokio::test]
async fn listed_posts_without_excerpt_get_one_derived() {
    let (database, posts, _) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({
            "title": "T", "content": "Body text", "authorId": "u1", "status": "published",
            "publishedAt": "2025-01-01T00:00:00Z",
        })),
    );
    database.insert(
        "posts",
        "p2",
        doc(json!({
            "title": "T", "content": "Body text", "excerpt": "Kept", "authorId": "u1",
            "status": "published", "publishedAt": "2025-01-02T00:00:00Z",
        })),
    );

    let listed = posts.list_published().await.unwrap();

    assert_eq!(listed[0].excerpt, "Kept");
    assert_eq!(listed[1].excerpt, "Body text...");
}

#[tokio::test]
async fn get_post_reports_missing_posts() {
    let (_, posts, _) = setup();
    assert_eq!(
        posts.get_post("nope").await,
        Err(BlogError::PostNotFound("nope".to_string()))
    );
}

#[tokio::test]
async fn views_are_counted_once_and_only_when_published() {
    let (database, posts, _) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({ "title": "T", "content": "C", "authorId": "u1", "status": "published" })),
    );
    database.insert(
        "posts",
        "p2",
        doc(json!({ "title": "T", "content": "C", "authorId": "u1", "status": "draft" })),
    );
    let published = posts.get_post("p1").await.unwrap();
    let draft = posts.get_post("p2").await.unwrap();

    assert!(posts.record_view(&published).await.unwrap());
    assert!(!posts.record_view(&published).await.unwrap());
    assert!(!posts.record_view(&draft).await.unwrap());

    assert_eq!(posts.get_post("p1").await.unwrap().view_count, 1);
    assert_eq!(posts.get_post("p2").await.unwrap().view_count, 0);
}

#[tokio::test]
async fn failed_view_is_retried() {
    let (database, posts, _) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({ "title": "T", "content": "C", "authorId": "u1", "status": "published" })),
    );
    let post = posts.get_post("p1").await.unwrap();

    database.fail_writes(true);
    assert!(matches!(
        posts.record_view(&post).await,
        Err(BlogError::Session(SessionError::Transport(_)))
    ));

    database.fail_writes(false);
    assert!(posts.record_view(&post).await.unwrap());
    assert_eq!(posts.get_post("p1").await.unwrap().view_count, 1);
}

#[tokio::test]
async fn toggle_like_adds_then_removes() {
    let (database, posts, store) = setup();
    database.insert(
        "posts",
        "p1",
        doc(json!({ "title": "T", "content": "C", "authorId": "u1", "likes": ["u9"] })),
    );
    let auth = sign_in(&store, Identity::new("u2"), None).await;

    let post = posts.get_post("p1").await.unwrap();
    assert!(posts.toggle_like(&auth, &post).await.unwrap());
    let post = posts.get_post("p1").await.unwrap();
    assert_eq!(post.likes, vec![IdentityId::from("u9"), IdentityId::from("u2")]);

    assert!(!posts.toggle_like(&auth, &post).await.unwrap());
    assert_eq!(posts.get_post("p1").await.unwrap().likes, vec![IdentityId::from("u9")]);
}

#[tokio::test]
async fn liking_requires_sign_in() {
    let (database, posts, store) = setup();
    database.insert("posts", "p1", doc(json!({ "title": "T", "content": "C", "authorId": "u1" })));
    let post = posts.get_post("p1").await.unwrap();

    assert_eq!(posts.toggle_like(&store.auth(), &post).await, Err(BlogError::NotSignedIn));
    assert_eq!(database.write_calls(), 0);
}
