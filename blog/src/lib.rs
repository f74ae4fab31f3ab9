//! # Quill Blog
//!
//! Blog services built on the Quill session store:
//!
//! - **[`PostService`]**: create and edit posts, list published ones, count
//!   views and toggle likes
//! - **[`ProfileService`]**: edit the signed-in user's profile record and
//!   refresh the session's copy
//! - **[`AccountService`]**: sign in, register, password reset
//!
//! Permissions come from the session's [`quill_session::AuthFacade`]; the
//! services never cache who is signed in.

pub mod account;
pub mod config;
pub mod error;
pub mod post;
pub mod posts;
pub mod profile;

pub use account::{AccountService, Registration};
pub use config::BlogConfig;
pub use error::{BlogError, Result};
pub use post::{Post, PostDraft, PostStatus};
pub use posts::PostService;
pub use profile::{ProfileService, ProfileUpdate};
