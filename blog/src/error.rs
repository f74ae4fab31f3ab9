//! Error types for blog services.

use quill_session::SessionError;
use thiserror::Error;

/// Result type for blog operations.
pub type Result<T> = std::result::Result<T, BlogError>;

/// Errors that can occur in blog services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlogError {
    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// Only the post's author or an admin may edit it.
    #[error("Not the author of post {0}")]
    NotPostAuthor(String),

    /// No post with this id.
    #[error("Post not found: {0}")]
    PostNotFound(String),

    /// Email address missing from the request.
    #[error("Email is required")]
    EmailRequired,

    /// The draft cannot be saved as is.
    #[error("Invalid draft: {0}")]
    InvalidDraft(String),

    /// A stored post could not be read.
    #[error("Malformed post {id}: {reason}")]
    MalformedPost {
        /// Document id.
        id: String,
        /// Decoder message.
        reason: String,
    },

    /// Session, identity provider or database failure.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl BlogError {
    /// Message suitable for showing to the person using the app.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => "You need to sign in first.".to_string(),
            Self::NotPostAuthor(_) => "You can only edit your own posts.".to_string(),
            Self::PostNotFound(_) => "Post not found.".to_string(),
            Self::EmailRequired => "Please enter your email address.".to_string(),
            Self::InvalidDraft(reason) => reason.clone(),
            Self::MalformedPost { .. } => "This post could not be loaded.".to_string(),
            Self::Session(error) => error.user_message(),
        }
    }
}
