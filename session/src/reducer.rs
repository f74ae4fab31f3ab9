//! Session reducer.
//!
//! Pure transition logic for the session state. Database reads and
//! sign-out requests are returned as effects; their outcome comes back as
//! a result action.
//!
//! # Flow
//!
//! ```text
//! SetIdentity ──▶ identity replaced (epoch advances if the id changed)
//! FetchProfile ─▶ loading = true ─▶ get_document ─▶ ProfileLoaded
//!                                                 ├▶ ProfileMissing
//!                                                 └▶ ProfileFetchFailed
//! SignOut ──────▶ sign_out ─▶ SignedOut ─▶ cleared (epoch advances)
//!                           └▶ SignOutFailed ─▶ unchanged
//! ```
//!
//! Profile results carry the epoch their fetch was issued in. A result
//! from an earlier epoch belongs to a session that already ended and only
//! settles `loading`.

use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::providers::{DocumentDatabase, IdentityProvider};
use crate::state::{IdentityId, Profile, SessionState};
use quill_core::effect::Effect;
use quill_core::reducer::Reducer;
use quill_core::{async_effect, smallvec, SmallVec};
use std::marker::PhantomData;

/// Session reducer.
pub struct SessionReducer<I, D> {
    _phantom: PhantomData<fn() -> (I, D)>,
}

impl<I, D> SessionReducer<I, D> {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<I, D> Default for SessionReducer<I, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, D> Clone for SessionReducer<I, D> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<I, D> std::fmt::Debug for SessionReducer<I, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionReducer")
    }
}

fn clear(state: &mut SessionState) {
    if state.identity.is_some() || state.profile.is_some() || state.loading {
        state.epoch = state.epoch.wrapping_add(1);
    }
    state.identity = None;
    state.profile = None;
    state.loading = false;
    state.last_known = None;
}

fn is_stale(state: &SessionState, id: &IdentityId, epoch: u64) -> bool {
    let stale = epoch != state.epoch;
    if stale {
        tracing::debug!(identity = %id, epoch, current = state.epoch, "Discarding profile result from an ended session");
    }
    stale
}

fn fetch_profile<I, D>(
    env: &SessionEnvironment<I, D>,
    id: IdentityId,
    epoch: u64,
) -> Effect<SessionAction>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    let database = env.database.clone();
    let collection = env.config.profiles_collection.clone();

    Effect::future(async move {
        let result = database.get_document(&collection, id.as_str()).await;
        match result {
            Ok(Some(fields)) => Some(SessionAction::ProfileLoaded { id, epoch, fields }),
            Ok(None) => Some(SessionAction::ProfileMissing { id, epoch }),
            Err(error) => Some(SessionAction::ProfileFetchFailed {
                id,
                epoch,
                error: error.to_string(),
            }),
        }
    })
}

fn sign_out<I, D>(env: &SessionEnvironment<I, D>) -> Effect<SessionAction>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    let identity = env.identity.clone();

    async_effect! {
        match identity.sign_out().await {
            Ok(()) => Some(SessionAction::SignedOut),
            Err(error) => Some(SessionAction::SignOutFailed {
                error: error.to_string(),
            }),
        }
    }
}

impl<I, D> Reducer for SessionReducer<I, D>
where
    I: IdentityProvider + Clone + 'static,
    D: DocumentDatabase + Clone + 'static,
{
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<I, D>;

    fn reduce(
        &self,
        state: &mut SessionState,
        action: SessionAction,
        env: &SessionEnvironment<I, D>,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        match action {
            SessionAction::SetIdentity(identity) => {
                tracing::debug!(identity = %identity.id, "Identity set");
                if state.identity.as_ref().map(|current| &current.id) != Some(&identity.id) {
                    state.epoch = state.epoch.wrapping_add(1);
                }
                state.last_known = Some(identity.projection());
                state.identity = Some(identity);
                smallvec![Effect::None]
            },

            SessionAction::Clear | SessionAction::SignedOut => {
                clear(state);
                smallvec![Effect::None]
            },

            SessionAction::FetchProfile { id } => {
                if id.is_empty() {
                    state.profile = None;
                    state.loading = false;
                    return smallvec![Effect::None];
                }

                state.loading = true;
                smallvec![fetch_profile(env, id, state.epoch)]
            },

            SessionAction::ProfileLoaded { id, epoch, fields } => {
                state.loading = false;
                if state.identity.is_none() || is_stale(state, &id, epoch) {
                    return smallvec![Effect::None];
                }
                state.profile = Some(Profile::new(id, fields));
                smallvec![Effect::None]
            },

            SessionAction::ProfileMissing { id, epoch } => {
                if is_stale(state, &id, epoch) {
                    state.loading = false;
                    return smallvec![Effect::None];
                }
                tracing::warn!(identity = %id, "No profile document for identity");
                state.profile = None;
                state.loading = false;
                smallvec![Effect::None]
            },

            SessionAction::ProfileFetchFailed { id, epoch, error } => {
                if is_stale(state, &id, epoch) {
                    state.loading = false;
                    return smallvec![Effect::None];
                }
                tracing::error!(identity = %id, %error, "Failed to fetch profile");
                state.profile = None;
                state.loading = false;
                smallvec![Effect::None]
            },

            SessionAction::UpdateProfile(profile) => {
                if state.identity.is_none() {
                    tracing::warn!(identity = %profile.id, "Ignoring profile update without identity");
                    return smallvec![Effect::None];
                }
                state.profile = Some(profile);
                smallvec![Effect::None]
            },

            SessionAction::SignOut => {
                if state.identity.is_none() {
                    return smallvec![Effect::None];
                }
                smallvec![sign_out(env)]
            },

            SessionAction::SignOutFailed { error } => {
                tracing::error!(%error, "Sign-out failed, keeping session");
                smallvec![Effect::None]
            },
        }
    }
}
