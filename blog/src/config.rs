//! Blog configuration.

/// Collection holding posts.
pub const DEFAULT_POSTS_COLLECTION: &str = "posts";

/// Posts shown on the dashboard.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Characters taken from the content when a draft has no excerpt.
pub const DEFAULT_EXCERPT_LENGTH: usize = 150;

/// Reading speed used for read time estimates.
pub const DEFAULT_WORDS_PER_MINUTE: usize = 200;

/// Role given to newly registered accounts.
pub const DEFAULT_ROLE: &str = "reader";

/// Blog service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogConfig {
    /// Collection posts are stored in.
    pub posts_collection: String,

    /// Maximum number of posts returned by `list_published`.
    pub page_size: usize,

    /// Excerpt length when a draft has none.
    pub excerpt_length: usize,

    /// Reading speed for read time estimates.
    pub words_per_minute: usize,

    /// Role written into new profile records.
    pub default_role: String,
}

impl BlogConfig {
    /// Load from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `QUILL_POSTS_COLLECTION` | `posts` |
    /// | `QUILL_PAGE_SIZE` | `10` |
    /// | `QUILL_EXCERPT_LENGTH` | `150` |
    /// | `QUILL_WORDS_PER_MINUTE` | `200` |
    /// | `QUILL_DEFAULT_ROLE` | `reader` |
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary lookup function.
    ///
    /// Numbers that don't parse, and zeros, fall back to the default.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: usize| {
            lookup(key)
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(default)
        };

        Self {
            posts_collection: lookup("QUILL_POSTS_COLLECTION")
                .unwrap_or_else(|| DEFAULT_POSTS_COLLECTION.to_string()),
            page_size: number("QUILL_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            excerpt_length: number("QUILL_EXCERPT_LENGTH", DEFAULT_EXCERPT_LENGTH),
            words_per_minute: number("QUILL_WORDS_PER_MINUTE", DEFAULT_WORDS_PER_MINUTE),
            default_role: lookup("QUILL_DEFAULT_ROLE").unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        }
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            posts_collection: DEFAULT_POSTS_COLLECTION.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            excerpt_length: DEFAULT_EXCERPT_LENGTH,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            default_role: DEFAULT_ROLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(BlogConfig::from_lookup(|_| None), BlogConfig::default());
    }

    #[test]
    fn values_are_read_and_bad_numbers_ignored() {
        let vars: HashMap<&str, &str> = [
            ("QUILL_POSTS_COLLECTION", "articles"),
            ("QUILL_PAGE_SIZE", "25"),
            ("QUILL_EXCERPT_LENGTH", "many"),
            ("QUILL_WORDS_PER_MINUTE", "0"),
            ("QUILL_DEFAULT_ROLE", "author"),
        ]
        .into_iter()
        .collect();

        let config = BlogConfig::from_lookup(|key| vars.get(key).map(ToString::to_string));

        assert_eq!(config.posts_collection, "articles");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.excerpt_length, DEFAULT_EXCERPT_LENGTH);
        assert_eq!(config.words_per_minute, DEFAULT_WORDS_PER_MINUTE);
        assert_eq!(config.default_role, "author");
    }
}
