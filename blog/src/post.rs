//! Posts and post drafts.
//!
//! A [`Post`] is what the `posts` collection holds. A [`PostDraft`] is what
//! an editor submits; the derived fields (slug, excerpt, tag list) are
//! computed from it when the post is saved.

use crate::error::{BlogError, Result};
use chrono::{DateTime, Utc};
use quill_session::{Document, IdentityId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Visible to its author only.
    #[default]
    Draft,
    /// Listed on the dashboard.
    Published,
}

impl PostStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// A stored blog post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Document id; not part of the stored fields.
    #[serde(skip)]
    pub id: String,

    /// Title.
    pub title: String,

    /// Markdown body.
    pub content: String,

    /// Short summary shown in listings.
    #[serde(default)]
    pub excerpt: String,

    /// Identity id of the author.
    pub author_id: IdentityId,

    /// Author name at the time of writing.
    #[serde(default)]
    pub author_name: String,

    /// Category label.
    #[serde(default)]
    pub category: String,

    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Cover image URL.
    #[serde(default)]
    pub featured_image: String,

    /// Publication status.
    #[serde(default)]
    pub status: PostStatus,

    /// URL slug derived from the title.
    #[serde(default)]
    pub slug: String,

    /// Number of recorded views.
    #[serde(default)]
    pub view_count: u64,

    /// Identities that liked the post.
    #[serde(default)]
    pub likes: Vec<IdentityId>,

    /// When the post was last published.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// When the post was last saved.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Decode a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::MalformedPost`] if required fields are missing
    /// or have the wrong type.
    pub fn from_document(id: impl Into<String>, fields: Document) -> Result<Self> {
        let id = id.into();
        let mut post: Self =
            serde_json::from_value(Value::Object(fields)).map_err(|e| BlogError::MalformedPost {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        post.id = id;
        Ok(post)
    }

    /// Whether the post is listed publicly.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Whether `id` has liked the post.
    #[must_use]
    pub fn is_liked_by(&self, id: &IdentityId) -> bool {
        self.likes.contains(id)
    }

    /// Estimated reading time in minutes.
    #[must_use]
    pub fn read_time(&self, words_per_minute: usize) -> usize {
        read_time_minutes(&self.content, words_per_minute)
    }
}

/// What an editor submits when creating or editing a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    /// Title; required.
    pub title: String,

    /// Markdown body; required.
    pub content: String,

    /// Summary; derived from the content when empty.
    pub excerpt: String,

    /// Category label.
    pub category: String,

    /// Comma separated tags as typed.
    pub tags: String,

    /// Cover image URL.
    pub featured_image: String,

    /// Status to save with.
    pub status: PostStatus,
}

impl PostDraft {
    /// Draft with a title and body.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Draft for editing an existing post.
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            excerpt: post.excerpt.clone(),
            category: post.category.clone(),
            tags: post.tags.join(", "),
            featured_image: post.featured_image.clone(),
            status: post.status,
        }
    }

    /// Set the status.
    #[must_use]
    pub const fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the comma separated tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Set an explicit excerpt.
    #[must_use]
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }

    /// Check the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`BlogError::InvalidDraft`] if the title or content is blank.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(BlogError::InvalidDraft("Title is required".to_string()));
        }
        if self.content.trim().is_empty() {
            return Err(BlogError::InvalidDraft("Content is required".to_string()));
        }
        Ok(())
    }

    /// Tag list.
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(&self.tags)
    }

    /// Slug derived from the title.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    /// The explicit excerpt, or one derived from the content.
    #[must_use]
    pub fn excerpt_or_derived(&self, length: usize) -> String {
        if self.excerpt.is_empty() {
            excerpt(&self.content, length)
        } else {
            self.excerpt.clone()
        }
    }
}

/// Split comma separated tags, trimming each and dropping empties.
///
/// ```
/// # use quill_blog::post::parse_tags;
/// assert_eq!(parse_tags(" rust, ,web ,"), vec!["rust", "web"]);
/// ```
#[must_use]
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// URL slug: lowercase, only `[a-z0-9 -]` kept, spaces and dash runs
/// become a single dash.
///
/// ```
/// # use quill_blog::post::slugify;
/// assert_eq!(slugify("Hello,  World -- Again!"), "hello-world-again");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        let c = match c {
            'a'..='z' | '0'..='9' => c,
            ' ' | '-' => '-',
            _ => continue,
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug
}

/// First `length` characters of `content` followed by `...`.
#[must_use]
pub fn excerpt(content: &str, length: usize) -> String {
    let mut excerpt: String = content.chars().take(length).collect();
    excerpt.push_str("...");
    excerpt
}

/// Minutes needed to read `content`, rounded up; 5 when there is no content.
#[must_use]
pub fn read_time_minutes(content: &str, words_per_minute: usize) -> usize {
    if content.is_empty() {
        return 5;
    }
    let words = content.split_whitespace().count().max(1);
    words.div_ceil(words_per_minute.max(1))
}
