//! Read-only authentication view.

use crate::state::{Identity, IdentityProjection, Profile, SessionState};
use tokio::sync::watch;

/// Derived authentication flags over the latest session.
///
/// Every call reads the current snapshot; nothing is cached.
#[derive(Debug, Clone)]
pub struct AuthFacade {
    state: watch::Receiver<SessionState>,
}

impl AuthFacade {
    /// Facade over a session receiver.
    #[must_use]
    pub const fn new(state: watch::Receiver<SessionState>) -> Self {
        Self { state }
    }

    /// An identity is present.
    ///
    /// A rehydrated `last_known` identity does not count.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().identity.is_some()
    }

    /// The profile's role is `admin`.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.state.borrow().role() == Some("admin")
    }

    /// The profile's role is `author`, or the user is an admin.
    #[must_use]
    pub fn is_author(&self) -> bool {
        let state = self.state.borrow();
        matches!(state.role(), Some("author" | "admin"))
    }

    /// Current identity.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// Cached profile.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// A profile fetch is outstanding or the session is unresolved.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Identity remembered from the previous run.
    #[must_use]
    pub fn last_known_user(&self) -> Option<IdentityProjection> {
        self.state.borrow().last_known.clone()
    }

    /// Copy of the whole session.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Wait for the next session change.
    ///
    /// Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }
}
