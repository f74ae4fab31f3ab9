//! Session and backend configuration.
//!
//! Values come from the environment with sensible defaults. `from_lookup`
//! takes any key → value function so tests never touch the process
//! environment.

use crate::error::{Result, SessionError};
use std::path::PathBuf;

/// Local storage key holding the persisted identity projection.
pub const DEFAULT_STORAGE_KEY: &str = "auth-storage";

/// Collection holding profile records keyed by identity id.
pub const DEFAULT_PROFILES_COLLECTION: &str = "users";

/// Session store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Local storage key for the persisted projection.
    ///
    /// Default: `"auth-storage"`
    pub storage_key: String,

    /// Collection the profile is fetched from.
    ///
    /// Default: `"users"`
    pub profiles_collection: String,

    /// Directory used by [`crate::stores::FileStorage`].
    ///
    /// Default: `.quill`
    pub storage_dir: PathBuf,
}

impl SessionConfig {
    /// Load from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `QUILL_STORAGE_KEY` | `auth-storage` |
    /// | `QUILL_PROFILES_COLLECTION` | `users` |
    /// | `QUILL_STORAGE_DIR` | `.quill` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary lookup function.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            storage_key: lookup("QUILL_STORAGE_KEY").unwrap_or(defaults.storage_key),
            profiles_collection: lookup("QUILL_PROFILES_COLLECTION")
                .unwrap_or(defaults.profiles_collection),
            storage_dir: lookup("QUILL_STORAGE_DIR")
                .map_or(defaults.storage_dir, PathBuf::from),
        }
    }

    /// Set the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the profiles collection.
    #[must_use]
    pub fn with_profiles_collection(mut self, collection: impl Into<String>) -> Self {
        self.profiles_collection = collection.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            profiles_collection: DEFAULT_PROFILES_COLLECTION.to_string(),
            storage_dir: PathBuf::from(".quill"),
        }
    }
}

/// Firebase project configuration shared by the auth and Firestore backends.
#[derive(Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Web API key.
    pub api_key: String,

    /// Project id.
    pub project_id: String,

    /// Firestore database id.
    ///
    /// Default: `(default)`
    pub database_id: String,

    /// Identity Toolkit base URL.
    pub identity_url: String,

    /// Firestore REST base URL.
    pub firestore_url: String,
}

impl FirebaseConfig {
    /// Identity Toolkit v1 endpoint.
    pub const DEFAULT_IDENTITY_URL: &'static str = "https://identitytoolkit.googleapis.com/v1";

    /// Firestore v1 endpoint.
    pub const DEFAULT_FIRESTORE_URL: &'static str = "https://firestore.googleapis.com/v1";

    /// Config for a project with default endpoints.
    #[must_use]
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            identity_url: Self::DEFAULT_IDENTITY_URL.to_string(),
            firestore_url: Self::DEFAULT_FIRESTORE_URL.to_string(),
        }
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if `FIREBASE_API_KEY` or
    /// `FIREBASE_PROJECT_ID` is missing or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if a required variable is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| SessionError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(required("FIREBASE_API_KEY")?, required("FIREBASE_PROJECT_ID")?);
        if let Some(database_id) = lookup("FIREBASE_DATABASE_ID") {
            config.database_id = database_id;
        }
        if let Some(url) = lookup("FIREBASE_IDENTITY_URL") {
            config.identity_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("FIREBASE_FIRESTORE_URL") {
            config.firestore_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

// The API key stays out of logs.
impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("identity_url", &self.identity_url)
            .field("firestore_url", &self.firestore_url)
            .finish()
    }
}
