//! Bridge from identity-provider notifications to the session store.

use crate::providers::{DocumentDatabase, IdentityProvider};
use crate::session_store::SessionStore;
use crate::state::AuthState;
use quill_runtime::EffectHandle;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

type FetchHandles = Arc<Mutex<Vec<EffectHandle>>>;

/// Drives a [`SessionStore`] from an [`IdentityProvider`].
///
/// | Notification | Store operations |
/// |---|---|
/// | `SignedIn(identity)` | `set_identity`, then `fetch_profile` (not awaited) |
/// | `SignedOut` | `clear` |
/// | `Initializing` | none |
///
/// Profile fetches are neither cancelled nor de-duplicated while attached:
/// when two overlap, the one that resolves last wins.
#[derive(Debug)]
pub struct SessionListener;

impl SessionListener {
    /// Start forwarding the provider's auth state to `store`.
    ///
    /// The current state is handled first, then every change.
    pub fn attach<I, D>(provider: &I, store: SessionStore<I, D>) -> Subscription
    where
        I: IdentityProvider + Clone + 'static,
        D: DocumentDatabase + Clone + 'static,
    {
        let fetches: FetchHandles = Arc::new(Mutex::new(Vec::new()));
        let auth_state = provider.auth_state();
        let task = tokio::spawn(run(auth_state, store, Arc::clone(&fetches)));

        tracing::debug!("Session listener attached");
        Subscription {
            task: Some(task),
            fetches,
        }
    }
}

async fn run<I, D>(
    mut auth_state: watch::Receiver<AuthState>,
    store: SessionStore<I, D>,
    fetches: FetchHandles,
) where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    loop {
        let current = auth_state.borrow_and_update().clone();
        if let Err(error) = handle(&current, &store, &fetches).await {
            tracing::warn!(%error, "Session store rejected auth state change");
            break;
        }

        if auth_state.changed().await.is_err() {
            tracing::debug!("Identity provider closed its auth state channel");
            break;
        }
    }
}

async fn handle<I, D>(
    state: &AuthState,
    store: &SessionStore<I, D>,
    fetches: &FetchHandles,
) -> crate::Result<()>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    match state {
        AuthState::Initializing => Ok(()),
        AuthState::SignedIn(identity) => {
            tracing::info!(identity = %identity.id, "Signed in");
            store.set_identity(identity.clone()).await?;
            let handle = store.fetch_profile(identity.id.clone()).await?;

            let mut fetches = fetches.lock().unwrap_or_else(PoisonError::into_inner);
            fetches.retain(|fetch| !fetch.is_complete());
            fetches.push(handle);
            Ok(())
        },
        AuthState::SignedOut => {
            tracing::info!("Signed out");
            store.clear().await
        },
    }
}

/// Live listener registration.
///
/// Dropping it stops the listener and cancels its profile fetches without
/// waiting. Use [`Subscription::detach`] to also wait for them to unwind.
#[must_use = "dropping a Subscription detaches the listener immediately"]
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
    fetches: FetchHandles,
}

impl Subscription {
    /// Stop the listener and wait until nothing it started can still
    /// mutate the store.
    pub async fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(error) = task.await {
                if !error.is_cancelled() {
                    tracing::error!(%error, "Session listener task failed");
                }
            }
        }

        let pending = self.cancel_fetches();
        futures::future::join_all(pending.into_iter().map(|mut handle| async move {
            handle.wait().await;
        }))
        .await;

        tracing::debug!("Session listener detached");
    }

    /// `false` once the listener stopped on its own (provider gone or store
    /// shut down).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn cancel_fetches(&self) -> Vec<EffectHandle> {
        let pending: Vec<EffectHandle> = self
            .fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in &pending {
            handle.cancel();
        }
        pending
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = self.cancel_fetches();
        }
    }
}
