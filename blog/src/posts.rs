//! Post service: create, edit, list, read, view counts and likes.

use crate::config::BlogConfig;
use crate::error::{BlogError, Result};
use crate::post::{excerpt, Post, PostDraft, PostStatus};
use quill_session::providers::{Direction, DocumentDatabase, DocumentUpdate, FieldTransform, Query};
use quill_session::{AuthFacade, Identity};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Post operations against the document database.
///
/// Every operation that needs a user reads it from an [`AuthFacade`], so the
/// service itself holds no session state. The only local state is the set of
/// posts whose view has already been counted.
pub struct PostService<D: DocumentDatabase> {
    database: D,
    config: BlogConfig,
    viewed: Mutex<HashSet<String>>,
}

impl<D: DocumentDatabase> PostService<D> {
    /// Create a service.
    #[must_use]
    pub fn new(database: D, config: BlogConfig) -> Self {
        Self {
            database,
            config,
            viewed: Mutex::new(HashSet::new()),
        }
    }

    /// Service configuration.
    #[must_use]
    pub const fn config(&self) -> &BlogConfig {
        &self.config
    }

    /// Create a post, or update `existing` from the draft.
    ///
    /// Creating starts the post with no views and no likes and the current
    /// user as author. Updating keeps the author and counters and is only
    /// allowed for the author or an admin. `updatedAt` is always stamped,
    /// `publishedAt` whenever the draft is published.
    ///
    /// # Returns
    ///
    /// The post id.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Nobody is signed in → [`BlogError::NotSignedIn`]
    /// - Title or content is blank → [`BlogError::InvalidDraft`]
    /// - The user may not edit `existing` → [`BlogError::NotPostAuthor`]
    /// - The database write fails
    #[tracing::instrument(skip_all, fields(post = existing.map(|post| post.id.as_str())))]
    pub async fn save_post(
        &self,
        auth: &AuthFacade,
        draft: &PostDraft,
        existing: Option<&Post>,
    ) -> Result<String> {
        let identity = auth.identity().ok_or(BlogError::NotSignedIn)?;
        draft.validate()?;

        let mut update = DocumentUpdate::new()
            .set("title", json!(draft.title))
            .set("content", json!(draft.content))
            .set("excerpt", json!(draft.excerpt_or_derived(self.config.excerpt_length)))
            .set("category", json!(draft.category))
            .set("tags", json!(draft.tag_list()))
            .set("featuredImage", json!(draft.featured_image))
            .set("status", json!(draft.status.as_str()))
            .set("slug", json!(draft.slug()))
            .transform("updatedAt", FieldTransform::ServerTimestamp);
        if draft.status == PostStatus::Published {
            update = update.transform("publishedAt", FieldTransform::ServerTimestamp);
        }

        let collection = &self.config.posts_collection;
        match existing {
            Some(post) => {
                if post.author_id != identity.id && !auth.is_admin() {
                    tracing::warn!(post = %post.id, user = %identity.id, "Edit rejected");
                    return Err(BlogError::NotPostAuthor(post.id.clone()));
                }
                self.database.update_document(collection, &post.id, update).await?;
                tracing::info!(post = %post.id, status = draft.status.as_str(), "Post updated");
                Ok(post.id.clone())
            },
            None => {
                let update = update
                    .set("authorId", json!(identity.id))
                    .set("authorName", json!(author_name(auth, &identity)))
                    .set("viewCount", json!(0))
                    .set("likes", json!([]));
                let id = self.database.add_document(collection, update).await?;
                tracing::info!(post = %id, status = draft.status.as_str(), "Post created");
                Ok(id)
            },
        }
    }

    /// Latest published posts, newest first, at most one page.
    ///
    /// Documents that don't decode as posts are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn list_published(&self) -> Result<Vec<Post>> {
        let query = Query::new()
            .where_eq("status", json!(PostStatus::Published.as_str()))
            .order_by("publishedAt", Direction::Descending)
            .limit(self.config.page_size);

        let documents = self.database.query(&self.config.posts_collection, query).await?;
        let posts: Vec<Post> = documents
            .into_iter()
            .filter_map(|(id, fields)| match Post::from_document(id, fields) {
                Ok(mut post) => {
                    if post.excerpt.is_empty() {
                        post.excerpt = excerpt(&post.content, self.config.excerpt_length);
                    }
                    Some(post)
                },
                Err(error) => {
                    tracing::warn!(%error, "Skipping post");
                    None
                },
            })
            .collect();

        tracing::debug!(count = posts.len(), "Listed published posts");
        Ok(posts)
    }

    /// Load one post.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No such post → [`BlogError::PostNotFound`]
    /// - The document doesn't decode → [`BlogError::MalformedPost`]
    /// - The read fails
    pub async fn get_post(&self, id: &str) -> Result<Post> {
        let fields = self
            .database
            .get_document(&self.config.posts_collection, id)
            .await?
            .ok_or_else(|| BlogError::PostNotFound(id.to_string()))?;
        Post::from_document(id, fields)
    }

    /// Count a view of `post`.
    ///
    /// Only published posts are counted, and each post at most once per
    /// service. A failed write leaves the post uncounted so a later call
    /// retries.
    ///
    /// # Returns
    ///
    /// Whether a view was recorded.
    ///
    /// # Errors
    ///
    /// Returns error if the database write fails.
    pub async fn record_view(&self, post: &Post) -> Result<bool> {
        if !post.is_published() || !self.mark_viewed(&post.id) {
            return Ok(false);
        }

        let update = DocumentUpdate::new().transform("viewCount", FieldTransform::Increment(json!(1)));
        if let Err(error) = self
            .database
            .update_document(&self.config.posts_collection, &post.id, update)
            .await
        {
            self.viewed.lock().unwrap_or_else(PoisonError::into_inner).remove(&post.id);
            tracing::warn!(post = %post.id, %error, "Failed to record view");
            return Err(error.into());
        }

        tracing::debug!(post = %post.id, "Recorded view");
        Ok(true)
    }

    /// Like `post`, or unlike it if the current user already does.
    ///
    /// # Returns
    ///
    /// Whether the user likes the post afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if nobody is signed in or the write fails.
    pub async fn toggle_like(&self, auth: &AuthFacade, post: &Post) -> Result<bool> {
        let identity = auth.identity().ok_or(BlogError::NotSignedIn)?;
        let liked = post.is_liked_by(&identity.id);

        let user = vec![json!(identity.id)];
        let transform = if liked {
            FieldTransform::ArrayRemove(user)
        } else {
            FieldTransform::ArrayUnion(user)
        };

        self.database
            .update_document(
                &self.config.posts_collection,
                &post.id,
                DocumentUpdate::new().transform("likes", transform),
            )
            .await?;

        tracing::debug!(post = %post.id, user = %identity.id, liked = !liked, "Toggled like");
        Ok(!liked)
    }

    fn mark_viewed(&self, id: &str) -> bool {
        self.viewed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string())
    }
}

/// Profile display name, falling back to the identity's email.
fn author_name(auth: &AuthFacade, identity: &Identity) -> String {
    auth.profile()
        .and_then(|profile| profile.display_name().map(ToString::to_string))
        .filter(|name| !name.is_empty())
        .or_else(|| identity.email.clone())
        .unwrap_or_default()
}
