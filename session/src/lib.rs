//! # Quill Session
//!
//! Keeps the application's view of "who is signed in" in sync with an
//! identity provider, a document database holding profile records, and
//! local storage.
//!
//! ## Components
//!
//! - **[`SessionStore`]**: owned, cloneable handle holding the current
//!   identity and cached profile; persists a minimal identity projection
//! - **[`SessionListener`]**: forwards provider auth-state changes to the
//!   store; returns a [`Subscription`] that detaches it
//! - **[`AuthFacade`]**: derived, read-only flags (authenticated, author,
//!   admin)
//!
//! ## Architecture
//!
//! The store runs a [`reducer::SessionReducer`] on the Quill runtime:
//!
//! ```text
//! provider ─▶ SessionListener ─▶ SessionAction ─▶ SessionReducer ─▶ SessionState
//!                                                      │                 │
//!                                          get_document / sign_out   watch + persistence
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_session::*;
//!
//! let environment = SessionEnvironment::new(provider.clone(), database);
//! let store = SessionStore::new(environment, FileStorage::new(".quill"));
//! let subscription = SessionListener::attach(&provider, store.clone());
//!
//! provider.sign_in_with_password("ada@example.com", "secret").await?;
//! let mut auth = store.auth();
//! while auth.is_loading() {
//!     auth.changed().await;
//! }
//! println!("author: {}", auth.is_author());
//!
//! subscription.detach().await;
//! ```

// Public modules
pub mod actions;
pub mod config;
pub mod environment;
pub mod error;
pub mod facade;
pub mod listener;
pub mod persistence;
pub mod providers;
pub mod reducer;
pub mod session_store;
pub mod state;
pub mod stores;

// Mock providers for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use actions::SessionAction;
pub use config::{FirebaseConfig, SessionConfig};
pub use environment::SessionEnvironment;
pub use error::{Result, SessionError};
pub use facade::AuthFacade;
pub use listener::{SessionListener, Subscription};
pub use session_store::SessionStore;
pub use state::{AuthState, Document, Identity, IdentityId, IdentityProjection, Profile, SessionState};
