//! Persistence of the identity projection to local storage.
//!
//! The slot holds a versioned envelope:
//!
//! ```json
//! {"state":{"identity":{"uid":"u1","email":"a@x.com","displayName":null}},"version":1}
//! ```
//!
//! Only the projection is ever written. Failures are logged and swallowed:
//! a broken storage medium must not break the session.

use crate::providers::LocalStorage;
use crate::state::{IdentityProjection, SessionState};
use quill_runtime::StateObserver;
use serde::{Deserialize, Serialize};

/// Envelope format version.
pub const PERSIST_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    state: PersistedState,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    identity: Option<IdentityProjection>,
}

/// Writes the identity projection on every session change.
pub struct SessionPersistence<L> {
    storage: L,
    key: String,
}

impl<L: LocalStorage> SessionPersistence<L> {
    /// Persist under `key`.
    #[must_use]
    pub fn new(storage: L, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Read the projection left by a previous run.
    ///
    /// Missing, unreadable or malformed slots yield `None`.
    #[must_use]
    pub fn load(&self) -> Option<IdentityProjection> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                tracing::warn!(key = %self.key, %error, "Could not read persisted session");
                return None;
            },
        };

        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(persisted) if persisted.version == PERSIST_VERSION => persisted.state.identity,
            Ok(persisted) => {
                tracing::warn!(
                    key = %self.key,
                    version = persisted.version,
                    "Ignoring persisted session with unknown version"
                );
                None
            },
            Err(error) => {
                tracing::warn!(key = %self.key, %error, "Ignoring malformed persisted session");
                None
            },
        }
    }

    /// Write the projection of `identity` (or `null`).
    pub fn save(&self, identity: Option<IdentityProjection>) {
        let envelope = PersistedSession {
            state: PersistedState { identity },
            version: PERSIST_VERSION,
        };

        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::error!(%error, "Could not encode session projection");
                return;
            },
        };

        if let Err(error) = self.storage.set_item(&self.key, &raw) {
            tracing::warn!(key = %self.key, %error, "Could not persist session");
        }
    }
}

impl<L: LocalStorage> StateObserver<SessionState> for SessionPersistence<L> {
    fn state_changed(&self, state: &SessionState) {
        self.save(state.identity.as_ref().map(crate::state::Identity::projection));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockLocalStorage;
    use crate::state::Identity;
    use serde_json::{json, Value};

    #[test]
    fn writes_versioned_envelope() {
        let storage = MockLocalStorage::new();
        let persistence = SessionPersistence::new(storage.clone(), "auth-storage");

        persistence.save(Some(Identity::new("u1").with_email("a@x.com").projection()));

        let raw = storage.raw("auth-storage").unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "state": { "identity": { "uid": "u1", "email": "a@x.com", "displayName": null } },
                "version": 1
            })
        );
    }

    #[test]
    fn round_trips_through_load() {
        let storage = MockLocalStorage::new();
        let persistence = SessionPersistence::new(storage, "auth-storage");
        let projection = Identity::new("u1").with_display_name("Ada").projection();

        persistence.save(Some(projection.clone()));
        assert_eq!(persistence.load(), Some(projection));

        persistence.save(None);
        assert_eq!(persistence.load(), None);
    }

    #[test]
    fn malformed_or_foreign_slots_are_ignored() {
        let storage = MockLocalStorage::new();
        let persistence = SessionPersistence::new(storage.clone(), "auth-storage");

        storage.seed("auth-storage", "{not json");
        assert_eq!(persistence.load(), None);

        storage.seed("auth-storage", r#"{"state":{"identity":{"uid":"u1"}},"version":7}"#);
        assert_eq!(persistence.load(), None);
    }

    #[test]
    fn storage_failures_are_swallowed() {
        let storage = MockLocalStorage::new();
        storage.fail_writes(true);
        let persistence = SessionPersistence::new(storage.clone(), "auth-storage");

        persistence.save(Some(Identity::new("u1").projection()));
        assert!(storage.raw("auth-storage").is_none());
    }
}
