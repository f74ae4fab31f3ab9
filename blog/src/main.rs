//! `quill`: prints the current session and the latest published posts.
//!
//! ```text
//! FIREBASE_API_KEY=... FIREBASE_PROJECT_ID=... \
//! QUILL_EMAIL=ada@example.com QUILL_PASSWORD=... cargo run --bin quill
//! ```

use quill_blog::{AccountService, BlogConfig, PostService};
use quill_session::stores::{FileStorage, FirebaseAuthProvider, FirestoreDatabase};
use quill_session::{
    AuthFacade, FirebaseConfig, SessionConfig, SessionEnvironment, SessionListener, SessionState,
    SessionStore,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=info,quill_blog=info,quill_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let firebase = FirebaseConfig::from_env()?;
    let session_config = SessionConfig::from_env();
    let blog_config = BlogConfig::from_env();
    info!(project = %firebase.project_id, storage = %session_config.storage_dir.display(), "Configuration loaded");

    let identity = FirebaseAuthProvider::new(firebase.clone());
    let database = FirestoreDatabase::new(firebase).with_credentials(identity.credentials());
    let storage = FileStorage::new(session_config.storage_dir.clone());

    let store = SessionStore::new(
        SessionEnvironment::new(identity.clone(), database.clone()).with_config(session_config.clone()),
        storage,
    );
    if let Some(last) = store.auth().last_known_user() {
        info!(identity = %last.id, "Last session belonged to this user");
    }

    let subscription = SessionListener::attach(&identity, store.clone());
    identity.restore_session();

    let mut auth = store.auth();
    settle(&mut auth, |state| state.identity.is_none() && !state.loading).await;

    if let (Ok(email), Ok(password)) = (std::env::var("QUILL_EMAIL"), std::env::var("QUILL_PASSWORD")) {
        let accounts = AccountService::new(identity.clone(), database.clone(), &session_config, &blog_config);
        match accounts.sign_in(&email, &password).await {
            Ok(signed_in) => {
                settle(&mut auth, |state| {
                    state.identity.as_ref().is_some_and(|i| i.id == signed_in.id) && !state.loading
                })
                .await;
            },
            Err(error) => warn!(%error, "{}", error.user_message()),
        }
    }

    print_session(&auth);

    let posts = PostService::new(database, blog_config);
    match posts.list_published().await {
        Ok(list) if list.is_empty() => println!("No published posts."),
        Ok(list) => {
            for post in list {
                println!(
                    "{} | {} | {} | {} min read | {} views | {} likes",
                    post.published_at.map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d").to_string()),
                    post.title,
                    post.author_name,
                    post.read_time(posts.config().words_per_minute),
                    post.view_count,
                    post.likes.len(),
                );
            }
        },
        Err(error) => warn!(%error, "Could not load posts"),
    }

    subscription.detach().await;
    store.shutdown(Duration::from_secs(5)).await?;
    info!("Shut down");
    Ok(())
}

/// Wait until the session satisfies `done`, giving up after a timeout.
async fn settle(auth: &mut AuthFacade, done: impl Fn(&SessionState) -> bool) {
    let wait = async {
        while !done(&auth.snapshot()) {
            if !auth.changed().await {
                break;
            }
        }
    };
    if tokio::time::timeout(SETTLE_TIMEOUT, wait).await.is_err() {
        warn!("Session did not settle in time");
    }
}

fn print_session(auth: &AuthFacade) {
    let Some(identity) = auth.identity() else {
        println!("Signed out.");
        return;
    };

    let role = if auth.is_admin() {
        "admin"
    } else if auth.is_author() {
        "author"
    } else {
        "reader"
    };
    let name = auth
        .profile()
        .and_then(|profile| profile.display_name().map(ToString::to_string))
        .or(identity.display_name)
        .or(identity.email)
        .unwrap_or_else(|| identity.id.to_string());
    println!("Signed in as {name} ({role}).");
}
