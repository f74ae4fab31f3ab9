//! Session state types.
//!
//! All types are `Clone` and `PartialEq` so the runtime can publish a new
//! snapshot only when a reducer step actually changed something.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A database document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

// ═══════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════

/// Opaque identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    /// Wrap a provider-issued id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id never names a profile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for IdentityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The provider's representation of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-issued id.
    pub id: IdentityId,

    /// Email, when the provider knows it.
    pub email: Option<String>,

    /// Display name, when set.
    pub display_name: Option<String>,
}

impl Identity {
    /// Identity with only an id.
    #[must_use]
    pub fn new(id: impl Into<IdentityId>) -> Self {
        Self {
            id: id.into(),
            email: None,
            display_name: None,
        }
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// The subset of this identity that may be written to local storage.
    #[must_use]
    pub fn projection(&self) -> IdentityProjection {
        IdentityProjection {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Minimal identity data persisted across restarts.
///
/// Never carries tokens or profile data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProjection {
    /// Provider-issued id.
    #[serde(rename = "uid")]
    pub id: IdentityId,

    /// Email at the time of the last write.
    #[serde(default)]
    pub email: Option<String>,

    /// Display name at the time of the last write.
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

/// Authentication state reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The provider has not determined the session yet.
    #[default]
    Initializing,

    /// A user is signed in.
    SignedIn(Identity),

    /// No user is signed in.
    SignedOut,
}

// ═══════════════════════════════════════════════════════════════════════
// Profile
// ═══════════════════════════════════════════════════════════════════════

/// Application-owned profile record, stored under the identity's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Id of the identity this profile belongs to.
    pub id: IdentityId,

    /// Raw document fields.
    pub fields: Document,
}

impl Profile {
    /// Profile built from a fetched document.
    #[must_use]
    pub const fn new(id: IdentityId, fields: Document) -> Self {
        Self { id, fields }
    }

    /// String field by name, if present and a string.
    #[must_use]
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// `role` field (`"reader"`, `"author"`, `"admin"`).
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.string_field("role")
    }

    /// `displayName` field.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.string_field("displayName")
    }

    /// `username` field.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.string_field("username")
    }

    /// `profilePicture` field.
    #[must_use]
    pub fn profile_picture(&self) -> Option<&str> {
        self.string_field("profilePicture")
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════

/// Root session state managed by the session reducer.
///
/// `profile` is only meaningful while `identity` is present; every step
/// that removes the identity removes the profile too.
///
/// # Examples
///
/// ```
/// # use quill_session::SessionState;
/// let state = SessionState::default();
/// assert!(state.identity.is_none());
/// assert!(state.loading);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Current identity, if signed in.
    pub identity: Option<Identity>,

    /// Cached profile record of the current identity.
    pub profile: Option<Profile>,

    /// A profile fetch is outstanding, or the session is not resolved yet.
    pub loading: bool,

    /// Identity rehydrated from local storage. Advisory only.
    pub last_known: Option<IdentityProjection>,

    /// Session generation. Advances whenever the session ends or the
    /// identity changes; profile results from an earlier generation are
    /// dropped.
    pub epoch: u64,
}

impl SessionState {
    /// Fresh state seeded with the projection read from local storage.
    #[must_use]
    pub const fn new(last_known: Option<IdentityProjection>) -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
            last_known,
            epoch: 0,
        }
    }

    /// Role of the cached profile.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.profile.as_ref().and_then(Profile::role)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None)
    }
}
