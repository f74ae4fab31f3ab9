//! Session actions.
//!
//! Requests (`SetIdentity`, `Clear`, `FetchProfile`, `UpdateProfile`,
//! `SignOut`) come from the listener and from consumers. Results
//! (`ProfileLoaded`, `ProfileMissing`, `ProfileFetchFailed`, `SignedOut`,
//! `SignOutFailed`) are produced by effects and fed back by the runtime.

use crate::state::{Document, Identity, IdentityId, Profile};

/// Every input the session reducer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    // ═══════════════════════════════════════════════════════════
    // Requests
    // ═══════════════════════════════════════════════════════════

    /// Replace the current identity.
    SetIdentity(Identity),

    /// Forget identity and profile.
    Clear,

    /// Load the profile record of an identity.
    FetchProfile {
        /// Identity whose profile to load.
        id: IdentityId,
    },

    /// Overwrite the cached profile without touching the database.
    UpdateProfile(Profile),

    /// Ask the identity provider to end the session.
    SignOut,

    // ═══════════════════════════════════════════════════════════
    // Effect results
    // ═══════════════════════════════════════════════════════════

    /// Profile document was found.
    ProfileLoaded {
        /// Identity the fetch was issued for.
        id: IdentityId,
        /// Session epoch the fetch was issued in.
        epoch: u64,
        /// Document fields.
        fields: Document,
    },

    /// No profile document exists for this identity.
    ProfileMissing {
        /// Identity the fetch was issued for.
        id: IdentityId,
        /// Session epoch the fetch was issued in.
        epoch: u64,
    },

    /// The profile fetch failed.
    ProfileFetchFailed {
        /// Identity the fetch was issued for.
        id: IdentityId,
        /// Session epoch the fetch was issued in.
        epoch: u64,
        /// Backend error description.
        error: String,
    },

    /// The provider ended the session.
    SignedOut,

    /// The provider refused to end the session.
    SignOutFailed {
        /// Backend error description.
        error: String,
    },
}
