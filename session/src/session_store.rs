//! The session store handle.

use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::error::Result;
use crate::facade::AuthFacade;
use crate::persistence::SessionPersistence;
use crate::providers::{DocumentDatabase, IdentityProvider, LocalStorage};
use crate::reducer::SessionReducer;
use crate::state::{Identity, IdentityId, Profile, SessionState};
use quill_runtime::{EffectHandle, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

type Runtime<I, D> =
    Store<SessionState, SessionAction, SessionEnvironment<I, D>, SessionReducer<I, D>>;

/// Authoritative holder of the current session.
///
/// One store per application, passed explicitly to whoever needs it.
/// Cloning yields another handle to the same session.
///
/// Every operation returns once the reducer ran and subscribers were
/// notified. The only error is [`crate::SessionError::Runtime`] after
/// [`SessionStore::shutdown`].
///
/// # Example
///
/// ```ignore
/// let store = SessionStore::new(environment, FileStorage::new(".quill"));
/// let _subscription = SessionListener::attach(&provider, store.clone());
///
/// if store.auth().is_author() {
///     // show the editor
/// }
/// ```
pub struct SessionStore<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    runtime: Runtime<I, D>,
}

impl<I, D> SessionStore<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    /// Create a store, rehydrating the last known identity from `storage`.
    ///
    /// The new session has no identity and `loading == true` until the
    /// listener reports the provider's state.
    #[must_use]
    pub fn new<L>(environment: SessionEnvironment<I, D>, storage: L) -> Self
    where
        L: LocalStorage + 'static,
    {
        let persistence = SessionPersistence::new(storage, environment.config.storage_key.clone());
        let last_known = persistence.load();
        if let Some(projection) = &last_known {
            tracing::info!(identity = %projection.id, "Rehydrated last known identity");
        }

        let runtime = Store::new(
            SessionState::new(last_known),
            SessionReducer::new(),
            environment,
        )
        .with_observer(Arc::new(persistence));

        Self { runtime }
    }

    /// Replace the current identity.
    ///
    /// # Errors
    ///
    /// Fails only when the store is shutting down.
    #[tracing::instrument(skip_all, fields(identity = %identity.id))]
    pub async fn set_identity(&self, identity: Identity) -> Result<()> {
        self.runtime.send(SessionAction::SetIdentity(identity)).await?;
        Ok(())
    }

    /// Forget identity and profile. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails only when the store is shutting down.
    #[tracing::instrument(skip_all)]
    pub async fn clear(&self) -> Result<()> {
        self.runtime.send(SessionAction::Clear).await?;
        Ok(())
    }

    /// Load the profile record of `id` from the database.
    ///
    /// Returns once loading is flagged; the read itself runs in the
    /// background. Await the handle to observe the settled state, or cancel
    /// it to drop the result. An empty id settles immediately without a
    /// database call.
    ///
    /// # Errors
    ///
    /// Fails only when the store is shutting down.
    #[tracing::instrument(skip_all, fields(identity = %id))]
    pub async fn fetch_profile(&self, id: IdentityId) -> Result<EffectHandle> {
        Ok(self.runtime.send(SessionAction::FetchProfile { id }).await?)
    }

    /// Overwrite the cached profile. Does not write to the database.
    ///
    /// # Errors
    ///
    /// Fails only when the store is shutting down.
    #[tracing::instrument(skip_all, fields(identity = %profile.id))]
    pub async fn update_profile(&self, profile: Profile) -> Result<()> {
        self.runtime.send(SessionAction::UpdateProfile(profile)).await?;
        Ok(())
    }

    /// Ask the provider to end the session and wait for the answer.
    ///
    /// On success the session is cleared; on failure it is left untouched
    /// and the error is only logged. Without an identity this is a no-op.
    ///
    /// # Errors
    ///
    /// Fails only when the store is shutting down.
    #[tracing::instrument(skip_all)]
    pub async fn sign_out(&self) -> Result<()> {
        let mut handle = self.runtime.send(SessionAction::SignOut).await?;
        handle.wait().await;
        Ok(())
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.runtime.subscribe_state().borrow().clone()
    }

    /// Receiver that always holds the latest session.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.runtime.subscribe_state()
    }

    /// Result actions produced by background work (profile loaded, missing,
    /// failed; signed out).
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<SessionAction> {
        self.runtime.subscribe_actions()
    }

    /// Read-only view with derived flags.
    #[must_use]
    pub fn auth(&self) -> AuthFacade {
        AuthFacade::new(self.runtime.subscribe_state())
    }

    /// Stop accepting operations and wait for background work.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SessionError::Runtime`] if work is still running
    /// after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.runtime.shutdown(timeout).await?;
        Ok(())
    }
}

impl<I, D> Clone for SessionStore<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
        }
    }
}
