//! Error types for session, identity and document operations.

use quill_runtime::StoreError;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Error taxonomy for the session module and its backends.
///
/// Store operations never surface backend failures: a missing or
/// unreachable profile leaves the session without a profile and is only
/// logged. These errors reach callers of the provider and database traits
/// directly (account flows, blog services) and of store operations when the
/// runtime is shutting down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    // ═══════════════════════════════════════════════════════════
    // Identity Provider Errors
    // ═══════════════════════════════════════════════════════════

    /// Email/password combination rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration attempted with an email that already has an account.
    #[error("Email already in use")]
    EmailAlreadyInUse,

    /// Password does not satisfy the provider's policy.
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Email address is malformed or missing.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Account exists but has been disabled.
    #[error("User account disabled")]
    UserDisabled,

    /// No account for this email.
    #[error("User not found")]
    UserNotFound,

    /// Provider throttled the request.
    #[error("Too many requests")]
    TooManyRequests,

    // ═══════════════════════════════════════════════════════════
    // Document Database Errors
    // ═══════════════════════════════════════════════════════════

    /// Update targeted a document that does not exist.
    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Network-level failure talking to a backend.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend answered with an error we do not map.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Local storage read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The session runtime refused the operation.
    #[error("Runtime error: {0}")]
    Runtime(#[from] StoreError),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Returns `true` if this error is due to invalid user input.
    ///
    /// # Examples
    ///
    /// ```
    /// # use quill_session::SessionError;
    /// assert!(SessionError::InvalidCredentials.is_user_error());
    /// assert!(!SessionError::Transport("reset".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::EmailAlreadyInUse
                | Self::WeakPassword(_)
                | Self::InvalidEmail
                | Self::UserDisabled
                | Self::UserNotFound
                | Self::TooManyRequests
        )
    }

    /// Message suitable for showing on a login or registration form.
    ///
    /// System errors collapse into a generic message; their detail belongs
    /// in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail => "Invalid email address.".to_string(),
            Self::UserDisabled => "This account has been disabled.".to_string(),
            Self::UserNotFound => "No account found with this email.".to_string(),
            Self::InvalidCredentials => "Incorrect password.".to_string(),
            Self::EmailAlreadyInUse => "An account with this email already exists.".to_string(),
            Self::WeakPassword(_) => "Password should be at least 6 characters.".to_string(),
            Self::TooManyRequests => "Too many attempts. Please try again later.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_user_errors() {
        for error in [
            SessionError::InvalidCredentials,
            SessionError::UserNotFound,
            SessionError::WeakPassword("short".into()),
        ] {
            assert!(error.is_user_error(), "{error:?}");
        }
        assert!(!SessionError::Runtime(StoreError::ShutdownInProgress).is_user_error());
    }

    #[test]
    fn system_errors_hide_detail_from_users() {
        let error = SessionError::Backend("PERMISSION_DENIED".into());
        assert!(!error.user_message().contains("PERMISSION_DENIED"));
        assert_eq!(
            SessionError::UserNotFound.user_message(),
            "No account found with this email."
        );
    }
}
