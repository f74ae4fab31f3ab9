//! Integration tests for the session store.

#![allow(clippy::unwrap_used)]

use quill_runtime::StoreError;
use quill_session::mocks::{MockDocumentDatabase, MockIdentityProvider, MockLocalStorage};
use quill_session::{
    Document, Identity, Profile, SessionAction, SessionEnvironment, SessionError, SessionState,
    SessionStore,
};
use serde_json::{json, Value};
use std::time::Duration;

type TestStore = SessionStore<MockIdentityProvider, MockDocumentDatabase>;

struct Harness {
    provider: MockIdentityProvider,
    database: MockDocumentDatabase,
    storage: MockLocalStorage,
    store: TestStore,
}

fn harness() -> Harness {
    quill_testing::helpers::init_tracing();
    let provider = MockIdentityProvider::new();
    let database = MockDocumentDatabase::new();
    let storage = MockLocalStorage::new();
    let store = SessionStore::new(
        SessionEnvironment::new(provider.clone(), database.clone()),
        storage.clone(),
    );
    Harness {
        provider,
        database,
        storage,
        store,
    }
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(fields) => fields,
        _ => Document::new(),
    }
}

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn new_store_starts_empty_and_loading() {
    let h = harness();
    assert_eq!(h.store.snapshot(), SessionState::default());
    assert!(h.storage.writes().is_empty());
}

#[tokio::test]
async fn fetch_profile_success_settles_loading() {
    let h = harness();
    h.database.insert("users", "u1", doc(json!({ "role": "author", "username": "ada" })));
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let mut handle = h.store.fetch_profile("u1".into()).await.unwrap();
    assert!(h.store.snapshot().loading);

    handle.wait_with_timeout(WAIT).await.unwrap();
    let state = h.store.snapshot();
    assert!(!state.loading);
    let profile = state.profile.unwrap();
    assert_eq!(profile.id.as_str(), "u1");
    assert_eq!(profile.username(), Some("ada"));
}

#[tokio::test]
async fn not_found_and_failure_both_settle_without_profile() {
    let h = harness();
    h.database.fail_document("broken");
    h.store.set_identity(Identity::new("u1")).await.unwrap();
    let mut actions = h.store.subscribe_actions();

    for id in ["missing", "broken"] {
        let mut handle = h.store.fetch_profile(id.into()).await.unwrap();
        handle.wait_with_timeout(WAIT).await.unwrap();

        let state = h.store.snapshot();
        assert!(state.profile.is_none(), "{id}");
        assert!(!state.loading, "{id}");
    }

    // Distinguishable only through the result actions
    assert!(matches!(
        actions.recv().await.unwrap(),
        SessionAction::ProfileMissing { id, .. } if id.as_str() == "missing"
    ));
    assert!(matches!(
        actions.recv().await.unwrap(),
        SessionAction::ProfileFetchFailed { id, .. } if id.as_str() == "broken"
    ));
}

#[tokio::test]
async fn empty_id_skips_the_database() {
    let h = harness();
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let handle = h.store.fetch_profile("".into()).await.unwrap();

    assert!(handle.is_complete());
    assert_eq!(h.database.get_calls(), 0);
    let state = h.store.snapshot();
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn clear_twice_equals_clear_once() {
    let h = harness();
    h.database.insert("users", "u1", doc(json!({ "role": "admin" })));
    h.store.set_identity(Identity::new("u1")).await.unwrap();
    h.store.fetch_profile("u1".into()).await.unwrap().wait().await;

    h.store.clear().await.unwrap();
    let once = h.store.snapshot();
    h.store.clear().await.unwrap();

    assert_eq!(h.store.snapshot(), once);
    assert_eq!(once.identity, None);
    assert_eq!(once.profile, None);
    assert!(!once.loading);
}

#[tokio::test]
async fn later_resolving_fetch_wins() {
    let h = harness();
    h.database.insert("users", "a", doc(json!({ "role": "author" })));
    h.database.insert("users", "b", doc(json!({ "role": "admin" })));
    h.database.delay_document("a", Duration::from_millis(60));
    h.database.delay_document("b", Duration::from_millis(5));
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let mut first = h.store.fetch_profile("a".into()).await.unwrap();
    let mut second = h.store.fetch_profile("b".into()).await.unwrap();
    second.wait_with_timeout(WAIT).await.unwrap();
    assert_eq!(h.store.snapshot().profile.unwrap().id.as_str(), "b");

    first.wait_with_timeout(WAIT).await.unwrap();
    let profile = h.store.snapshot().profile.unwrap();
    assert_eq!(profile.id.as_str(), "a");
    assert_eq!(profile.role(), Some("author"));
}

#[tokio::test]
async fn cancelled_fetch_never_lands() {
    let h = harness();
    h.database.insert("users", "u1", doc(json!({ "role": "author" })));
    h.database.delay_document("u1", Duration::from_secs(30));
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let mut handle = h.store.fetch_profile("u1".into()).await.unwrap();
    assert_eq!(handle.cancel(), 1);
    handle.wait_with_timeout(WAIT).await.unwrap();

    assert!(h.store.snapshot().profile.is_none());
}

#[tokio::test]
async fn profile_landing_after_clear_is_discarded() {
    let h = harness();
    h.database.insert("users", "u1", doc(json!({ "role": "author" })));
    h.database.delay_document("u1", Duration::from_millis(30));
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let mut handle = h.store.fetch_profile("u1".into()).await.unwrap();
    h.store.clear().await.unwrap();
    handle.wait_with_timeout(WAIT).await.unwrap();

    let state = h.store.snapshot();
    assert!(state.identity.is_none());
    assert!(state.profile.is_none());
    assert!(!state.loading);
}

#[tokio::test]
async fn update_profile_is_local_only() {
    let h = harness();
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    let profile = Profile::new("u1".into(), doc(json!({ "role": "author" })));
    h.store.update_profile(profile.clone()).await.unwrap();

    assert_eq!(h.store.snapshot().profile, Some(profile));
    assert_eq!(h.database.write_calls(), 0);
    assert!(h.store.auth().is_author());
}

#[tokio::test]
async fn sign_out_clears_after_provider_confirms() {
    let h = harness();
    h.store.set_identity(Identity::new("u1")).await.unwrap();

    h.store.sign_out().await.unwrap();

    assert_eq!(h.provider.sign_out_calls(), 1);
    assert!(!h.store.auth().is_authenticated());
}

#[tokio::test]
async fn sign_out_failure_leaves_session_intact() {
    let h = harness();
    h.provider.fail_sign_out(true);
    h.store.set_identity(Identity::new("u1")).await.unwrap();
    let before = h.store.snapshot();

    h.store.sign_out().await.unwrap();

    assert_eq!(h.provider.sign_out_calls(), 1);
    assert_eq!(h.store.snapshot(), before);
}

#[tokio::test]
async fn sign_out_without_identity_does_not_call_provider() {
    let h = harness();
    h.store.sign_out().await.unwrap();
    assert_eq!(h.provider.sign_out_calls(), 0);
}

#[tokio::test]
async fn only_the_projection_is_persisted() {
    let h = harness();
    h.database.insert("users", "u1", doc(json!({ "role": "admin", "secret": "s3cr3t" })));
    h.store
        .set_identity(Identity::new("u1").with_email("a@x.com"))
        .await
        .unwrap();
    h.store.fetch_profile("u1".into()).await.unwrap().wait().await;

    let raw = h.storage.raw("auth-storage").unwrap();
    let persisted: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        persisted,
        json!({
            "state": { "identity": { "uid": "u1", "email": "a@x.com", "displayName": null } },
            "version": 1
        })
    );
    assert!(h.storage.writes().iter().all(|(key, value)| {
        key == "auth-storage" && value.as_deref().is_some_and(|v| !v.contains("s3cr3t"))
    }));
}

#[tokio::test]
async fn projection_survives_restart_as_last_known() {
    let h = harness();
    h.store
        .set_identity(Identity::new("u1").with_display_name("Ada"))
        .await
        .unwrap();

    let restarted = SessionStore::new(
        SessionEnvironment::new(h.provider.clone(), h.database.clone()),
        h.storage.clone(),
    );

    let state = restarted.snapshot();
    assert!(state.identity.is_none());
    assert!(state.loading);
    let last_known = restarted.auth().last_known_user().unwrap();
    assert_eq!(last_known.id.as_str(), "u1");
    assert_eq!(last_known.display_name.as_deref(), Some("Ada"));
    assert!(!restarted.auth().is_authenticated());
}

#[tokio::test]
async fn clear_persists_null_identity() {
    let h = harness();
    h.store.set_identity(Identity::new("u1")).await.unwrap();
    h.store.clear().await.unwrap();

    let raw = h.storage.raw("auth-storage").unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&raw).unwrap(),
        json!({ "state": { "identity": null }, "version": 1 })
    );
}

#[tokio::test]
async fn malformed_slot_is_ignored_at_startup() {
    let storage = MockLocalStorage::new();
    storage.seed("auth-storage", "{\"state\":");

    let store = SessionStore::new(
        SessionEnvironment::new(MockIdentityProvider::new(), MockDocumentDatabase::new()),
        storage,
    );

    assert_eq!(store.snapshot(), SessionState::default());
}

#[tokio::test]
async fn storage_failures_do_not_reach_callers() {
    let h = harness();
    h.storage.fail_writes(true);

    h.store.set_identity(Identity::new("u1")).await.unwrap();
    h.store.clear().await.unwrap();

    assert!(h.storage.writes().is_empty());
}

#[tokio::test]
async fn shutdown_rejects_further_operations() {
    let h = harness();
    h.store.shutdown(WAIT).await.unwrap();

    assert_eq!(
        h.store.set_identity(Identity::new("u1")).await,
        Err(SessionError::Runtime(StoreError::ShutdownInProgress))
    );
}
