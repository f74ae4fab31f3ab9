//! End-to-end tests: identity provider → listener → store → facade.

#![allow(clippy::unwrap_used)]

use quill_session::mocks::{MockDocumentDatabase, MockIdentityProvider, MockLocalStorage};
use quill_session::{
    AuthState, Document, Identity, SessionEnvironment, SessionListener, SessionState,
    SessionStore,
};
use quill_testing::helpers::{init_tracing, wait_for};
use serde_json::{json, Value};
use std::time::Duration;

fn setup() -> (
    MockIdentityProvider,
    MockDocumentDatabase,
    SessionStore<MockIdentityProvider, MockDocumentDatabase>,
) {
    init_tracing();
    let provider = MockIdentityProvider::new();
    let database = MockDocumentDatabase::new();
    let store = SessionStore::new(
        SessionEnvironment::new(provider.clone(), database.clone()),
        MockLocalStorage::new(),
    );
    (provider, database, store)
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(fields) => fields,
        _ => Document::new(),
    }
}

fn settled(state: &SessionState) -> bool {
    !state.loading
}

#[tokio::test]
async fn sign_in_loads_identity_and_author_role() {
    let (provider, database, store) = setup();
    database.insert("users", "u1", doc(json!({ "role": "author" })));
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u1").with_email("a@x.com"));
    let state = wait_for(store.subscribe(), |s| s.profile.is_some()).await;

    let identity = state.identity.unwrap();
    assert_eq!(identity.id.as_str(), "u1");
    assert_eq!(identity.email.as_deref(), Some("a@x.com"));

    let auth = store.auth();
    assert!(auth.is_authenticated());
    assert!(auth.is_author());
    assert!(!auth.is_admin());
    assert!(!auth.is_loading());

    subscription.detach().await;
}

#[tokio::test]
async fn sign_out_after_sign_in_clears_everything() {
    let (provider, database, store) = setup();
    database.insert("users", "u1", doc(json!({ "role": "admin" })));
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u1"));
    wait_for(store.subscribe(), |s| s.profile.is_some()).await;

    provider.emit_signed_out();
    let state = wait_for(store.subscribe(), |s| s.identity.is_none()).await;

    assert!(state.profile.is_none());
    assert!(!state.loading);
    assert!(!store.auth().is_authenticated());
    assert!(!store.auth().is_admin());

    subscription.detach().await;
}

#[tokio::test]
async fn slow_profile_from_previous_user_never_reaches_the_next_one() {
    let (provider, database, store) = setup();
    database.insert("users", "admin1", doc(json!({ "role": "admin" })));
    database.insert("users", "reader2", doc(json!({ "role": "reader" })));
    database.delay_document("admin1", Duration::from_millis(150));
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("admin1"));
    wait_for(store.subscribe(), |s| s.identity.is_some()).await;

    provider.emit_signed_out();
    wait_for(store.subscribe(), |s| s.identity.is_none()).await;

    provider.emit_signed_in(Identity::new("reader2"));
    wait_for(store.subscribe(), |s| s.profile.is_some()).await;

    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = store.snapshot();
    assert_eq!(state.identity.unwrap().id.as_str(), "reader2");
    let profile = state.profile.unwrap();
    assert_eq!(profile.id.as_str(), "reader2");
    assert_eq!(profile.role(), Some("reader"));
    assert!(!store.auth().is_admin());
    assert!(!state.loading);

    subscription.detach().await;
}

#[tokio::test]
async fn current_state_is_handled_on_attach() {
    let (provider, _database, store) = setup();
    provider.emit_signed_out();

    let subscription = SessionListener::attach(&provider, store.clone());
    let state = wait_for(store.subscribe(), settled).await;

    assert!(state.identity.is_none());
    subscription.detach().await;
}

#[tokio::test]
async fn initializing_is_ignored() {
    let (provider, database, store) = setup();
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit(AuthState::Initializing);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.snapshot(), SessionState::default());
    assert_eq!(database.get_calls(), 0);
    assert!(subscription.is_active());
    subscription.detach().await;
}

#[tokio::test]
async fn missing_profile_leaves_identity_without_role() {
    let (provider, _database, store) = setup();
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u2"));
    let state = wait_for(store.subscribe(), |s| s.identity.is_some() && !s.loading).await;

    assert!(state.profile.is_none());
    assert!(store.auth().is_authenticated());
    assert!(!store.auth().is_author());
    subscription.detach().await;
}

#[tokio::test]
async fn detach_stops_all_mutations() {
    let (provider, database, store) = setup();
    database.insert("users", "u1", doc(json!({ "role": "author" })));
    database.delay_document("u1", Duration::from_millis(100));
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u1"));
    wait_for(store.subscribe(), |s| s.identity.is_some()).await;

    subscription.detach().await;
    let detached = store.snapshot();

    provider.emit_signed_out();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(store.snapshot(), detached);
    assert!(detached.identity.is_some());
    assert!(store.snapshot().profile.is_none());
}

#[tokio::test]
async fn dropping_the_subscription_detaches() {
    let (provider, _database, store) = setup();
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u1"));
    wait_for(store.subscribe(), |s| s.identity.is_some() && !s.loading).await;

    drop(subscription);
    provider.emit_signed_out();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(store.auth().is_authenticated());
}

#[tokio::test]
async fn listener_stops_when_store_shuts_down() {
    let (provider, _database, store) = setup();
    let subscription = SessionListener::attach(&provider, store.clone());
    store.shutdown(Duration::from_secs(1)).await.unwrap();

    provider.emit_signed_in(Identity::new("u1"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!subscription.is_active());
    assert!(store.snapshot().identity.is_none());
    subscription.detach().await;
}

#[tokio::test]
async fn provider_sign_out_through_store_round_trips() {
    let (provider, _database, store) = setup();
    let subscription = SessionListener::attach(&provider, store.clone());

    provider.emit_signed_in(Identity::new("u1"));
    wait_for(store.subscribe(), |s| s.identity.is_some()).await;

    store.sign_out().await.unwrap();

    assert_eq!(provider.sign_out_calls(), 1);
    assert!(store.snapshot().identity.is_none());
    subscription.detach().await;
}
