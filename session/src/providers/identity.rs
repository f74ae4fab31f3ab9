//! Identity provider trait.

use crate::error::Result;
use crate::state::{AuthState, Identity};
use std::future::Future;
use tokio::sync::watch;

/// Identity provider.
///
/// This trait abstracts over the hosted authentication service.
///
/// # Implementation Notes
///
/// - `auth_state` starts at [`AuthState::Initializing`] until the provider
///   has decided whether a session exists
/// - A successful `sign_in_with_password`, `register_with_password` or
///   `sign_out` also publishes the new state on the `auth_state` channel
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to authentication state changes.
    ///
    /// The receiver holds the current state immediately.
    fn auth_state(&self) -> watch::Receiver<AuthState>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the provider could not end the session.
    fn sign_out(&self) -> impl Future<Output = Result<()>> + Send;

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Credentials are rejected → `SessionError::InvalidCredentials`
    /// - No such account → `SessionError::UserNotFound`
    /// - Account disabled → `SessionError::UserDisabled`
    /// - Network request fails
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity>> + Send;

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Email is taken → `SessionError::EmailAlreadyInUse`
    /// - Password rejected → `SessionError::WeakPassword`
    /// - Network request fails
    fn register_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity>> + Send;

    /// Set the display name of the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns error if nobody is signed in or the request fails.
    fn update_display_name(
        &self,
        display_name: &str,
    ) -> impl Future<Output = Result<Identity>> + Send;

    /// Send a password reset email.
    ///
    /// # Errors
    ///
    /// Returns error if the email is unknown or the request fails.
    fn send_password_reset(&self, email: &str) -> impl Future<Output = Result<()>> + Send;
}
