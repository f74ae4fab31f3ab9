//! Sign in, registration and password reset.

use crate::config::BlogConfig;
use crate::error::{BlogError, Result};
use quill_session::config::SessionConfig;
use quill_session::providers::{DocumentDatabase, DocumentUpdate, FieldTransform, IdentityProvider};
use quill_session::Identity;
use serde_json::json;

/// A new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Login email.
    pub email: String,

    /// Password.
    pub password: String,

    /// Display name for the identity and the profile record.
    pub display_name: String,
}

/// Account operations against the identity provider.
///
/// Successful sign-in and registration are observed by the session through
/// the provider's auth state; nothing here touches the session store.
#[derive(Debug, Clone)]
pub struct AccountService<I, D> {
    identity: I,
    database: D,
    profiles_collection: String,
    default_role: String,
}

impl<I, D> AccountService<I, D>
where
    I: IdentityProvider,
    D: DocumentDatabase,
{
    /// Create a service.
    #[must_use]
    pub fn new(identity: I, database: D, session: &SessionConfig, blog: &BlogConfig) -> Self {
        Self {
            identity,
            database,
            profiles_collection: session.profiles_collection.clone(),
            default_role: blog.default_role.clone(),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::EmailRequired`] for a blank email, otherwise the
    /// provider's error (invalid credentials, unknown user, ...).
    #[tracing::instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity> {
        let email = required_email(email)?;
        let identity = self.identity.sign_in_with_password(email, password).await?;
        tracing::info!(identity = %identity.id, "Signed in");
        Ok(identity)
    }

    /// Create an account with a profile record.
    ///
    /// The identity is created first, then `users/{id}` is provisioned with
    /// the default role, then the display name is set on the identity.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::EmailRequired`] for a blank email, or the
    /// provider's or database's error. A failure after the identity was
    /// created leaves the identity in place.
    #[tracing::instrument(skip_all, fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<Identity> {
        let email = required_email(&registration.email)?;
        let created = self
            .identity
            .register_with_password(email, &registration.password)
            .await?;

        let profile = DocumentUpdate::new()
            .set("email", json!(email))
            .set("displayName", json!(registration.display_name))
            .set("username", json!(""))
            .set("profilePicture", json!(""))
            .set("role", json!(self.default_role))
            .transform("createdAt", FieldTransform::ServerTimestamp)
            .transform("updatedAt", FieldTransform::ServerTimestamp);
        self.database
            .set_document(&self.profiles_collection, created.id.as_str(), profile)
            .await?;

        // Publishes the identity again, so the session refetches the
        // now-provisioned profile.
        let identity = self.identity.update_display_name(&registration.display_name).await?;

        tracing::info!(identity = %identity.id, role = %self.default_role, "Registered");
        Ok(identity)
    }

    /// Email a password reset link.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::EmailRequired`] without calling the provider for
    /// a blank email, otherwise the provider's error.
    #[tracing::instrument(skip(self))]
    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let email = required_email(email)?;
        self.identity.send_password_reset(email).await?;
        tracing::info!("Password reset sent");
        Ok(())
    }
}

fn required_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(BlogError::EmailRequired);
    }
    Ok(email)
}
