//! Profile editing.

use crate::error::{BlogError, Result};
use chrono::Utc;
use quill_session::config::SessionConfig;
use quill_session::providers::{DocumentDatabase, DocumentUpdate, FieldTransform, IdentityProvider};
use quill_session::{Document, Profile, SessionStore};
use serde_json::json;

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// Name shown on posts.
    pub display_name: String,

    /// Handle.
    pub username: String,

    /// Avatar URL.
    pub profile_picture: String,
}

impl ProfileUpdate {
    /// Pre-filled from the current profile record.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name().unwrap_or_default().to_string(),
            username: profile.username().unwrap_or_default().to_string(),
            profile_picture: profile.profile_picture().unwrap_or_default().to_string(),
        }
    }
}

/// Writes profile records and keeps the session's cached copy in step.
#[derive(Debug, Clone)]
pub struct ProfileService<D: DocumentDatabase> {
    database: D,
    collection: String,
}

impl<D> ProfileService<D>
where
    D: DocumentDatabase + Clone + 'static,
{
    /// Create a service writing to the configured profiles collection.
    #[must_use]
    pub fn new(database: D, config: &SessionConfig) -> Self {
        Self {
            database,
            collection: config.profiles_collection.clone(),
        }
    }

    /// Update the signed-in user's profile record.
    ///
    /// The record must already exist. On success the store's profile is
    /// replaced by the stored fields merged with `update`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Nobody is signed in → [`BlogError::NotSignedIn`]
    /// - The record doesn't exist or the write fails
    #[tracing::instrument(skip_all)]
    pub async fn update_profile<I>(
        &self,
        store: &SessionStore<I, D>,
        update: ProfileUpdate,
    ) -> Result<Profile>
    where
        I: IdentityProvider + Clone + 'static,
    {
        let session = store.snapshot();
        let identity = session.identity.ok_or(BlogError::NotSignedIn)?;

        let write = DocumentUpdate::new()
            .set("displayName", json!(update.display_name))
            .set("username", json!(update.username))
            .set("profilePicture", json!(update.profile_picture))
            .transform("updatedAt", FieldTransform::ServerTimestamp);

        self.database
            .update_document(&self.collection, identity.id.as_str(), write.clone())
            .await?;

        let mut fields = session
            .profile
            .filter(|profile| profile.id == identity.id)
            .map_or_else(Document::new, |profile| profile.fields);
        write.apply_to(&mut fields, Utc::now());

        let profile = Profile::new(identity.id.clone(), fields);
        store.update_profile(profile.clone()).await?;

        tracing::info!(identity = %identity.id, "Profile updated");
        Ok(profile)
    }
}
